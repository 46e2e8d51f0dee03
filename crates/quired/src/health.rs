//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use quire_config::{Config, ListenEndpoint};

use crate::bootstrap::BootstrapError;
use crate::serve::ServeError;

const TARGET: &str = "quired::health";

/// Observer of daemon lifecycle events.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener is bound and accepting requests.
    fn listening(&self, endpoint: &ListenEndpoint);

    /// Invoked when a shutdown signal arrives.
    fn shutdown_requested(&self);

    /// Invoked when the server stops with an error.
    fn serve_failed(&self, error: &ServeError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listening(&self, endpoint: &ListenEndpoint) {
        (**self).listening(endpoint);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }

    fn serve_failed(&self, error: &ServeError) {
        (**self).serve_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(target: TARGET, event = "bootstrap_starting", "starting daemon bootstrap");
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            work_dir = %config.work_dir(),
            build_dir = %config.build_dir(),
            container_runtime = config.container_runtime(),
            container_image = config.container_image(),
            build_timeout_secs = config.build_timeout_secs,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listening(&self, endpoint: &ListenEndpoint) {
        tracing::info!(target: TARGET, event = "listening", endpoint = %endpoint, "accepting requests");
    }

    fn shutdown_requested(&self) {
        tracing::info!(target: TARGET, event = "shutdown_requested", "shutting down");
    }

    fn serve_failed(&self, error: &ServeError) {
        tracing::error!(target: TARGET, event = "serve_failed", error = %error, "server stopped");
    }
}
