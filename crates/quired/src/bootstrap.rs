//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use quire_config::{Config, ListenPreparationError};

use crate::health::HealthReporter;
use crate::http::AppState;
use crate::telemetry::{self, TelemetryError};

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The listen socket's directory could not be prepared.
    #[error("failed to prepare listen socket: {source}")]
    Listen {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: ListenPreparationError,
    },
}

/// Result of a successful bootstrap.
pub struct Daemon {
    config: Config,
    state: AppState,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared request state built from the configuration.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Reporter receiving lifecycle events.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry or listener
/// preparation fails. Each failure is also reported to `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = telemetry::initialise(&config) {
        let error = BootstrapError::Telemetry { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    if let Err(source) = config.listen().prepare_filesystem() {
        let error = BootstrapError::Listen { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let state = AppState::from_config(&config);
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        state,
        reporter,
    })
}
