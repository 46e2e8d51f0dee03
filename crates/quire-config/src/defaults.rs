//! Built-in defaults applied before any configuration layer.

use std::env;

use camino::Utf8PathBuf;

use crate::listen::ListenEndpoint;
use crate::logging::LogFormat;

/// TCP port the daemon binds when nothing else is configured.
pub const DEFAULT_TCP_PORT: u16 = 8888;

/// Runtime client used to launch build containers.
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

/// Image carrying the document compiler.
pub const DEFAULT_CONTAINER_IMAGE: &str = "amutake/satysfi:latest";

/// Build deadline in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 10;

/// Allowance for a forced kill to settle, in seconds.
pub const DEFAULT_KILL_GRACE_SECS: u64 = 5;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Loopback TCP endpoint on [`DEFAULT_TCP_PORT`].
#[must_use]
pub fn default_listen_endpoint() -> ListenEndpoint {
    ListenEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}

/// `quire` beneath the system temporary directory.
#[must_use]
pub fn default_build_dir() -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.join("quire")
}

pub(crate) fn default_container_runtime() -> String {
    DEFAULT_CONTAINER_RUNTIME.to_owned()
}

pub(crate) fn default_container_image() -> String {
    DEFAULT_CONTAINER_IMAGE.to_owned()
}

pub(crate) fn default_work_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("projects")
}

pub(crate) fn default_template_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("template")
}

pub(crate) fn default_ui_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("dist")
}

pub(crate) const fn default_build_timeout_secs() -> u64 {
    DEFAULT_BUILD_TIMEOUT_SECS
}

pub(crate) const fn default_kill_grace_secs() -> u64 {
    DEFAULT_KILL_GRACE_SECS
}
