//! Daemon behind the Quire document editor.
//!
//! `quired` loads configuration, installs structured telemetry and serves the
//! editor API over TCP or a Unix socket. Projects live in a
//! [`quire_workspace::ProjectStore`]; compiles run through a
//! [`quire_sandbox::Isolator`] so every build sees a private snapshot inside a
//! throwaway container.

mod bootstrap;
mod health;
pub mod http;
mod serve;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use serve::{BoundListener, ServeError, run_daemon, serve_until, shutdown_signal};
pub use telemetry::TelemetryError;

#[cfg(test)]
mod tests;
