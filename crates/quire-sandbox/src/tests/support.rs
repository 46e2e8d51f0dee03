//! Scripted container runtime used by the sandbox tests.
//!
//! The script understands the `run` and `kill` sub-commands issued by the
//! isolator. `run` copies the target document to `out.pdf` unless the
//! document contains one of the markers below:
//!
//! - `HANG`: records its pid and sleeps; `kill` terminates it.
//! - `STUBBORN`: sleeps and ignores `kill`.
//! - `FAIL`: exits with status 3 without writing an artifact.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::isolator::BuildSettings;

const SCRIPT: &str = r#"#!/bin/sh
state='__STATE__'
command="$1"
shift
case "$command" in
  kill)
    echo "$1" >> "$state/kills.log"
    if [ -f "$state/$1.pid" ]; then
      kill "$(cat "$state/$1.pid")" 2>/dev/null
    fi
    exit 0
    ;;
  run)
    name=''
    mount=''
    while [ "$#" -gt 0 ]; do
      case "$1" in
        --name) name="$2"; shift 2 ;;
        -v) mount="${2%%:*}"; shift 2 ;;
        -w) shift 2 ;;
        --rm) shift ;;
        *) break ;;
      esac
    done
    shift 2
    relative="${1#/mount/}"
    source="$mount/$relative"
    echo "$name" >> "$state/runs.log"
    echo "compiling $relative"
    echo "fake compiler warning" >&2
    if grep -q STUBBORN "$source"; then
      exec sleep 30
    fi
    if grep -q HANG "$source"; then
      echo "$$" > "$state/$name.pid"
      exec sleep 30
    fi
    if grep -q FAIL "$source"; then
      exit 3
    fi
    cp "$source" "$mount/out.pdf"
    exit 0
    ;;
esac
exit 64
"#;

/// Installed fake runtime with its state directory.
pub(crate) struct FakeRuntime {
    state: TempDir,
    program: PathBuf,
}

impl FakeRuntime {
    pub(crate) fn install() -> Self {
        let state = TempDir::new().expect("state dir");
        let program = state.path().join("fake-runtime");
        let script = SCRIPT.replace("__STATE__", &state.path().to_string_lossy());
        fs::write(&program, script).expect("write fake runtime");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).expect("chmod");
        Self { state, program }
    }

    pub(crate) fn program(&self) -> &Path {
        &self.program
    }

    fn log(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.state.path().join(name))
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Container names passed to `kill`, in order.
    pub(crate) fn kills(&self) -> Vec<String> {
        self.log("kills.log")
    }

    /// Container names passed to `run`, in order.
    pub(crate) fn runs(&self) -> Vec<String> {
        self.log("runs.log")
    }
}

/// Build root plus project sources for one test.
pub(crate) struct BuildFixture {
    pub(crate) runtime: FakeRuntime,
    pub(crate) scratch: TempDir,
}

impl BuildFixture {
    pub(crate) fn new() -> Self {
        Self {
            runtime: FakeRuntime::install(),
            scratch: TempDir::new().expect("scratch dir"),
        }
    }

    pub(crate) fn build_root(&self) -> PathBuf {
        self.scratch.path().join("builds")
    }

    pub(crate) fn settings(&self, deadline: Duration, kill_grace: Duration) -> BuildSettings {
        BuildSettings {
            runtime: self.runtime.program().to_path_buf(),
            image: String::from("quire/fake:latest"),
            build_root: self.build_root(),
            deadline,
            kill_grace,
        }
    }

    /// Writes a project containing `main.saty` with `source` and returns its
    /// root.
    pub(crate) fn project(&self, name: &str, source: &str) -> PathBuf {
        let root = self.scratch.path().join("projects").join(name);
        fs::create_dir_all(&root).expect("project dir");
        fs::write(root.join("main.saty"), source).expect("write source");
        root
    }

    /// Entries left under the build root.
    pub(crate) fn leftover_builds(&self) -> usize {
        fs::read_dir(self.build_root()).map_or(0, Iterator::count)
    }
}
