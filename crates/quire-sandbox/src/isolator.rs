//! Builds run against a private snapshot of a project.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quire_config::Config;
use quire_workspace::{ProjectId, ProjectStore, WorkspaceError, copy_tree, verify_path};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::result::{BuildResult, BuildStatus};
use crate::runtime::{ARTIFACT_NAME, ContainerRuntime, RunInvocation, generate_container_name};
use crate::supervisor::{RunOutcome, Supervisor};

const TARGET: &str = "quire_sandbox::isolator";

/// Name prefix of every ephemeral build directory.
pub const BUILD_DIR_PREFIX: &str = "quirebuild";

/// Parameters shared by every build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Container runtime client program.
    pub runtime: PathBuf,
    /// Image providing the compiler.
    pub image: String,
    /// Directory under which build directories are allocated.
    pub build_root: PathBuf,
    /// Wall-clock budget of a build.
    pub deadline: Duration,
    /// Time allowed for a forced kill to settle.
    pub kill_grace: Duration,
}

impl From<&Config> for BuildSettings {
    fn from(config: &Config) -> Self {
        Self {
            runtime: PathBuf::from(config.container_runtime()),
            image: config.container_image().to_owned(),
            build_root: config.build_dir().as_std_path().to_path_buf(),
            deadline: config.build_timeout(),
            kill_grace: config.kill_grace(),
        }
    }
}

/// Compiles projects inside throwaway containers.
#[derive(Debug, Clone)]
pub struct Isolator {
    settings: BuildSettings,
    runtime: ContainerRuntime,
    supervisor: Supervisor,
}

impl Isolator {
    /// Creates an isolator from `settings`.
    #[must_use]
    pub fn new(settings: BuildSettings) -> Self {
        let runtime = ContainerRuntime::new(settings.runtime.clone());
        let supervisor = Supervisor::new(runtime.clone(), settings.deadline, settings.kill_grace);
        Self {
            settings,
            runtime,
            supervisor,
        }
    }

    /// Compiles `target` from a snapshot of `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTarget`] for unsafe targets before any
    /// side effect, and the corresponding [`BuildError`] when allocating,
    /// copying, supervising or reading the artifact fails. The build directory
    /// is removed in every case.
    pub async fn compile(&self, project_root: &Path, target: &str) -> Result<BuildResult, BuildError> {
        ensure_target(target)?;
        let root = project_root.to_path_buf();
        self.spawn_build(target, move |destination| copy_tree(&root, destination))
            .await
    }

    /// Compiles `target` from a snapshot of a stored project.
    ///
    /// The project's read lock is held while the snapshot is copied and
    /// released before the container starts.
    ///
    /// # Errors
    ///
    /// As for [`Isolator::compile`], plus [`BuildError::Workspace`] when the
    /// project does not exist.
    pub async fn compile_project(
        &self,
        store: &ProjectStore,
        id: &ProjectId,
        target: &str,
    ) -> Result<BuildResult, BuildError> {
        ensure_target(target)?;
        let root = store.project_root(id)?;
        let guard = store.read_guard(id).await;
        self.spawn_build(target, move |destination| {
            let copied = copy_tree(&root, destination);
            drop(guard);
            copied
        })
        .await
    }

    /// Drives the build on its own task. Once started, a build runs to its
    /// outcome (including the kill by name and directory removal) even if
    /// the caller stops awaiting it.
    async fn spawn_build<F>(&self, target: &str, populate: F) -> Result<BuildResult, BuildError>
    where
        F: FnOnce(&Path) -> Result<u64, WorkspaceError> + Send + 'static,
    {
        let isolator = self.clone();
        let target = target.to_owned();
        let build = tokio::spawn(async move { isolator.compile_with(&target, populate).await });
        match build.await {
            Ok(result) => result,
            Err(error) => Err(BuildError::Worker(error)),
        }
    }

    async fn compile_with<F>(&self, target: &str, populate: F) -> Result<BuildResult, BuildError>
    where
        F: FnOnce(&Path) -> Result<u64, WorkspaceError> + Send + 'static,
    {
        let workdir = self.allocate().await?;
        let result = self.build_in(workdir.path(), target, populate).await;
        discard(workdir).await;
        result
    }

    async fn allocate(&self) -> Result<TempDir, BuildError> {
        let build_root = &self.settings.build_root;
        let failed = |source: io::Error| BuildError::BuildDirectory {
            path: build_root.clone(),
            source: Arc::new(source),
        };
        tokio::fs::create_dir_all(build_root).await.map_err(failed)?;
        let canonical_root = tokio::fs::canonicalize(build_root).await.map_err(failed)?;
        let workdir = tempfile::Builder::new()
            .prefix(BUILD_DIR_PREFIX)
            .tempdir_in(&canonical_root)
            .map_err(failed)?;
        debug!(target: TARGET, path = %workdir.path().display(), "allocated build directory");
        Ok(workdir)
    }

    async fn build_in<F>(
        &self,
        workdir: &Path,
        target: &str,
        populate: F,
    ) -> Result<BuildResult, BuildError>
    where
        F: FnOnce(&Path) -> Result<u64, WorkspaceError> + Send + 'static,
    {
        let destination = workdir.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || populate(&destination))
            .await
            .map_err(|error| BuildError::Snapshot(WorkspaceError::Worker(error)))?
            .map_err(BuildError::Snapshot)?;
        debug!(target: TARGET, files = copied, "snapshot complete");

        let name = generate_container_name();
        let invocation = RunInvocation {
            name: &name,
            host_dir: workdir,
            image: &self.settings.image,
            target,
        };
        let run = self
            .supervisor
            .run(&name, self.runtime.run_command(&invocation))
            .await?;

        let artifact = read_artifact(&workdir.join(ARTIFACT_NAME)).await?;
        let (status, exit_code) = match run.outcome {
            RunOutcome::TimedOut => (BuildStatus::TimedOut, None),
            RunOutcome::Completed { exit_code } if artifact.is_some() => {
                (BuildStatus::Produced, exit_code)
            }
            RunOutcome::Completed { exit_code } => (BuildStatus::NoArtifact, exit_code),
        };
        info!(
            target: TARGET,
            container = %name,
            status = status.as_str(),
            exit_code,
            artifact_bytes = artifact.as_ref().map_or(0, Vec::len),
            "build finished"
        );

        Ok(BuildResult {
            container_name: name,
            status,
            exit_code,
            artifact,
            stdout: String::from_utf8_lossy(&run.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&run.stderr).into_owned(),
            elapsed: run.elapsed,
        })
    }
}

fn ensure_target(target: &str) -> Result<(), BuildError> {
    if target.trim_start_matches('/').is_empty() || !verify_path(target) {
        return Err(BuildError::InvalidTarget {
            target: target.to_owned(),
        });
    }
    Ok(())
}

async fn read_artifact(path: &Path) -> Result<Option<Vec<u8>>, BuildError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(BuildError::Artifact {
            path: path.to_path_buf(),
            source: Arc::new(error),
        }),
    }
}

/// Removes the build directory off the async executor.
async fn discard(workdir: TempDir) {
    let path = workdir.path().to_path_buf();
    match tokio::task::spawn_blocking(move || workdir.close()).await {
        Ok(Ok(())) => debug!(target: TARGET, path = %path.display(), "removed build directory"),
        Ok(Err(error)) => {
            warn!(target: TARGET, path = %path.display(), %error, "failed to remove build directory");
        }
        Err(error) => {
            warn!(target: TARGET, path = %path.display(), %error, "build directory cleanup task failed");
        }
    }
}
