//! Command lines for the container runtime client.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use quire_workspace::random_hex;
use tokio::process::Command;

/// Where the build directory is mounted inside the container.
pub const MOUNT_POINT: &str = "/mount";

/// Artifact the compiler writes into the mount.
pub const ARTIFACT_NAME: &str = "out.pdf";

/// Compiler executable inside the image.
pub const COMPILER: &str = "satysfi";

/// Prefix of every container name.
pub const CONTAINER_PREFIX: &str = "quire-";

/// Random bytes in a container name suffix.
const NAME_BYTES: usize = 8;

/// Returns a fresh container name, `quire-` followed by 16 hex characters.
#[must_use]
pub fn generate_container_name() -> String {
    format!("{CONTAINER_PREFIX}{}", random_hex(NAME_BYTES))
}

/// One container invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunInvocation<'a> {
    /// Container name used for the out-of-band kill.
    pub name: &'a str,
    /// Host directory mounted at [`MOUNT_POINT`].
    pub host_dir: &'a Path,
    /// Image providing the compiler.
    pub image: &'a str,
    /// Document path relative to the mount.
    pub target: &'a str,
}

/// Runtime client program such as `docker` or `podman`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRuntime {
    program: PathBuf,
}

impl ContainerRuntime {
    /// Wraps the runtime client program.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runtime client program.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments of the `run` invocation.
    #[must_use]
    pub fn run_args(invocation: &RunInvocation<'_>) -> Vec<OsString> {
        let mut volume = OsString::from(invocation.host_dir.as_os_str());
        volume.push(":");
        volume.push(MOUNT_POINT);
        let target = invocation.target.trim_start_matches('/');

        vec![
            OsString::from("run"),
            OsString::from("--name"),
            OsString::from(invocation.name),
            OsString::from("--rm"),
            OsString::from("-v"),
            volume,
            OsString::from("-w"),
            OsString::from(MOUNT_POINT),
            OsString::from(invocation.image),
            OsString::from(COMPILER),
            OsString::from(format!("{MOUNT_POINT}/{target}")),
            OsString::from("-o"),
            OsString::from(format!("{MOUNT_POINT}/{ARTIFACT_NAME}")),
        ]
    }

    /// Builds the `run` command with piped output.
    #[must_use]
    pub fn run_command(&self, invocation: &RunInvocation<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(Self::run_args(invocation))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Builds the out-of-band `kill` command for a container.
    #[must_use]
    pub fn kill_command(&self, name: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("kill")
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}
