//! Process-wide `tracing` setup for the daemon.
//!
//! Events go to stderr through a single `fmt` layer stacked on the registry,
//! gated by an [`EnvFilter`] built from `log_filter`. The layer renders one
//! JSON object per event or a compact line, depending on `log_format`.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt, registry};

use quire_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber already owns the global dispatcher.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] TryInitError),
}

/// Installs the global subscriber the first time it is called.
///
/// Later calls are no-ops, so tests may bootstrap the daemon repeatedly.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an invalid filter expression and
/// [`TelemetryError::Subscriber`] when a subscriber is already installed.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).map(|_| ())
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter = env_filter(config.log_filter())?;
    let stderr = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_thread_names(false);
    let output = match config.log_format() {
        LogFormat::Json => stderr.json().flatten_event(true).boxed(),
        LogFormat::Compact => stderr.compact().boxed(),
    };

    registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn env_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}
