//! Test doubles and fixtures shared by the daemon suites.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoError;
use tempfile::TempDir;

use quire_config::{Config, ListenEndpoint};
use quire_sandbox::{BuildSettings, Isolator};
use quire_workspace::ProjectStore;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::http::AppState;
use crate::serve::ServeError;

/// Runtime program that is never installed.
pub const MISSING_RUNTIME: &str = "/nonexistent/quire-runtime";

#[cfg(unix)]
const FAKE_RUNTIME: &str = r#"#!/bin/sh
command="$1"
shift
case "$command" in
  kill) exit 0 ;;
  run)
    mount=''
    while [ "$#" -gt 0 ]; do
      case "$1" in
        --name) shift 2 ;;
        -v) mount="${2%%:*}"; shift 2 ;;
        -w) shift 2 ;;
        --rm) shift ;;
        *) break ;;
      esac
    done
    shift 2
    source="$mount/${1#/mount/}"
    echo "compiled ${1#/mount/}"
    if grep -q FAIL "$source"; then
      echo "syntax error" >&2
      exit 1
    fi
    cp "$source" "$mount/out.pdf"
    exit 0
    ;;
esac
exit 64
"#;

/// Temporary directory tree standing in for a deployment.
pub struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        fs::create_dir_all(root.path().join("template")).expect("template dir");
        fs::write(root.path().join("template/main.saty"), "template document\n")
            .expect("template file");
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.path().join("template")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.path().join("build")
    }

    pub fn ui_dir(&self) -> PathBuf {
        self.path().join("ui")
    }

    /// Writes the scripted runtime and returns its path.
    #[cfg(unix)]
    pub fn install_runtime(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let program = self.path().join("fake-runtime");
        fs::write(&program, FAKE_RUNTIME).expect("write fake runtime");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).expect("chmod");
        program
    }

    pub fn config(&self, runtime: &Path, listen: ListenEndpoint) -> Config {
        let utf8 = |path: PathBuf| Utf8PathBuf::from_path_buf(path).expect("utf-8 temp path");
        Config {
            listen,
            container_runtime: runtime.to_str().expect("utf-8 runtime path").to_owned(),
            work_dir: utf8(self.work_dir()),
            build_dir: utf8(self.build_dir()),
            template_dir: utf8(self.template_dir()),
            ui_dir: utf8(self.ui_dir()),
            build_timeout_secs: 5,
            kill_grace_secs: 1,
            ..Config::default()
        }
    }

    pub fn state(&self, runtime: &Path, ui_dir: Option<PathBuf>) -> AppState {
        let store = ProjectStore::new(self.work_dir(), self.template_dir());
        let isolator = Isolator::new(BuildSettings {
            runtime: runtime.to_path_buf(),
            image: "quire/test".to_owned(),
            build_root: self.build_dir(),
            deadline: Duration::from_secs(5),
            kill_grace: Duration::from_secs(1),
        });
        AppState::new(store, isolator, ui_dir)
    }
}

/// Loader returning a configuration rooted in a temporary directory.
pub struct TestConfigLoader {
    sandbox: Arc<Sandbox>,
    listen: ListenEndpoint,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        Self::listening_on(ListenEndpoint::tcp("127.0.0.1", 0))
    }

    pub fn listening_on(listen: ListenEndpoint) -> Self {
        Self {
            sandbox: Arc::new(Sandbox::new()),
            listen,
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self
            .sandbox
            .config(Path::new(MISSING_RUNTIME), self.listen.clone()))
    }
}

/// Loader that fails by passing an invalid listen endpoint.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("quired"),
            OsString::from("--listen"),
            OsString::from("invalid://socket"),
        ])
    }
}

/// Lifecycle events captured by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    Listening(ListenEndpoint),
    ShutdownRequested,
    ServeFailed(String),
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listening(&self, endpoint: &ListenEndpoint) {
        self.record(HealthEvent::Listening(endpoint.clone()));
    }

    fn shutdown_requested(&self) {
        self.record(HealthEvent::ShutdownRequested);
    }

    fn serve_failed(&self, error: &ServeError) {
        self.record(HealthEvent::ServeFailed(error.to_string()));
    }
}
