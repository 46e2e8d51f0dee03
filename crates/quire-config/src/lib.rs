//! Shared configuration for the Quire build service.
//!
//! A single [`Config`] value describes where projects live, which container
//! image compiles them, how long a build may run, and how the daemon logs and
//! listens. Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `QUIRE_*` environment variables, then command-line
//! flags.
//!
//! The resolved value is handed to each component when it is constructed.
//! Nothing in the workspace reads configuration from global state.

mod defaults;
mod listen;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_CONTAINER_IMAGE, DEFAULT_CONTAINER_RUNTIME,
    DEFAULT_KILL_GRACE_SECS, DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, default_build_dir,
    default_listen_endpoint, default_log_filter, default_log_format,
};
pub use listen::{ListenEndpoint, ListenParseError, ListenPreparationError};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration consumed by the daemon and its components.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "QUIRE")]
pub struct Config {
    /// Endpoint the HTTP daemon binds, e.g. `tcp://127.0.0.1:8888` or
    /// `unix:///run/quire/quired.sock`.
    #[serde(default = "defaults::default_listen_endpoint")]
    pub listen: ListenEndpoint,
    /// Container runtime client used to run and kill build containers.
    #[serde(default = "defaults::default_container_runtime")]
    pub container_runtime: String,
    /// Image providing the document compiler.
    #[serde(default = "defaults::default_container_image")]
    pub container_image: String,
    /// Directory holding one sub-directory per project.
    #[serde(default = "defaults::default_work_dir")]
    pub work_dir: Utf8PathBuf,
    /// Directory under which ephemeral build directories are allocated.
    #[serde(default = "defaults::default_build_dir")]
    pub build_dir: Utf8PathBuf,
    /// Directory copied into every newly created project.
    #[serde(default = "defaults::default_template_dir")]
    pub template_dir: Utf8PathBuf,
    /// Directory of static UI assets served for non-API paths when present.
    #[serde(default = "defaults::default_ui_dir")]
    pub ui_dir: Utf8PathBuf,
    /// Wall-clock limit for a single build, in seconds.
    #[serde(default = "defaults::default_build_timeout_secs")]
    pub build_timeout_secs: u64,
    /// Time allowed for a forced kill to take effect, in seconds.
    #[serde(default = "defaults::default_kill_grace_secs")]
    pub kill_grace_secs: u64,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            container_runtime: defaults::default_container_runtime(),
            container_image: defaults::default_container_image(),
            work_dir: defaults::default_work_dir(),
            build_dir: default_build_dir(),
            template_dir: defaults::default_template_dir(),
            ui_dir: defaults::default_ui_dir(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            kill_grace_secs: DEFAULT_KILL_GRACE_SECS,
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments, environment and
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any layer fails to parse or merge.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration using `args` in place of the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any layer fails to parse or merge.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the daemon listens on.
    #[must_use]
    pub const fn listen(&self) -> &ListenEndpoint {
        &self.listen
    }

    /// Container runtime client program.
    #[must_use]
    pub fn container_runtime(&self) -> &str {
        &self.container_runtime
    }

    /// Build image name.
    #[must_use]
    pub fn container_image(&self) -> &str {
        &self.container_image
    }

    /// Root of all project workspaces.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        &self.work_dir
    }

    /// Root for ephemeral build directories.
    #[must_use]
    pub fn build_dir(&self) -> &Utf8Path {
        &self.build_dir
    }

    /// Template copied into new projects.
    #[must_use]
    pub fn template_dir(&self) -> &Utf8Path {
        &self.template_dir
    }

    /// Static UI asset directory.
    #[must_use]
    pub fn ui_dir(&self) -> &Utf8Path {
        &self.ui_dir
    }

    /// Build deadline as a [`Duration`].
    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Kill propagation allowance as a [`Duration`].
    #[must_use]
    pub const fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
