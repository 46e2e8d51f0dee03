//! Entry point for the `quired` daemon.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use quired::{StructuredHealthReporter, SystemConfigLoader, bootstrap_with, run_daemon};

#[tokio::main]
async fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let daemon = match bootstrap_with(&SystemConfigLoader, reporter) {
        Ok(daemon) => daemon,
        Err(error) => {
            drop(writeln!(io::stderr(), "quired: {error}"));
            return ExitCode::FAILURE;
        }
    };

    match run_daemon(daemon).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(io::stderr(), "quired: {error}"));
            ExitCode::FAILURE
        }
    }
}
