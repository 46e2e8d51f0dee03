//! Project lifecycle: creation from a template, indexing, reads and saves.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedRwLockReadGuard;
use tracing::{debug, info};

use crate::content::looks_like_text;
use crate::copy::copy_tree;
use crate::error::WorkspaceError;
use crate::id::ProjectId;
use crate::locks::ProjectLocks;
use crate::tree::{Directory, build_tree};
use crate::validate::resolve_within;

const TARGET: &str = "quire_workspace::store";

/// Identifiers tried before project creation gives up.
pub const CREATE_ATTEMPTS: usize = 16;

#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o775;
#[cfg(unix)]
const FILE_MODE: u32 = 0o640;

/// Contents of a text file read from a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFile {
    /// Final path component.
    pub name: String,
    /// Path as requested by the client.
    pub path: String,
    /// File contents.
    pub content: String,
}

/// Access to every project under the work directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    work_dir: PathBuf,
    template_dir: PathBuf,
    locks: Arc<ProjectLocks>,
}

impl ProjectStore {
    /// Creates a store rooted at `work_dir` that seeds new projects from
    /// `template_dir`.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            template_dir: template_dir.into(),
            locks: Arc::new(ProjectLocks::new()),
        }
    }

    /// Directory holding every project.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the directory of an existing project.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::ProjectNotFound`] when no such directory
    /// exists.
    pub fn project_root(&self, id: &ProjectId) -> Result<PathBuf, WorkspaceError> {
        let root = self.work_dir.join(id.as_str());
        if root.is_dir() {
            Ok(root)
        } else {
            Err(WorkspaceError::ProjectNotFound { id: id.clone() })
        }
    }

    /// Allocates a fresh identifier and copies the template into it.
    ///
    /// The directory is claimed with an atomic `create_dir`, so concurrent
    /// creations never share a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::IdSpaceExhausted`] when every attempt
    /// collided, or a filesystem error when the directory or template copy
    /// fails. A partially copied project is removed.
    pub async fn create_project(&self) -> Result<ProjectId, WorkspaceError> {
        let work_dir = self.work_dir.clone();
        let template_dir = self.template_dir.clone();
        let id = tokio::task::spawn_blocking(move || create_blocking(&work_dir, &template_dir))
            .await
            .map_err(WorkspaceError::Worker)??;
        info!(target: TARGET, project = %id, "created project");
        Ok(id)
    }

    /// Indexes the project's directory tree.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::ProjectNotFound`] for unknown projects and
    /// [`WorkspaceError::Traversal`] when the walk fails.
    pub async fn tree(&self, id: &ProjectId) -> Result<Directory, WorkspaceError> {
        let root = self.project_root(id)?;
        let _guard = self.locks.read(id).await;
        let tree = tokio::task::spawn_blocking(move || build_tree(&root))
            .await
            .map_err(WorkspaceError::Worker)??;
        Ok(tree)
    }

    /// Reads a text file from the project.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unsafe paths,
    /// [`WorkspaceError::FileNotFound`] when the path is not a regular file
    /// and [`WorkspaceError::NotText`] when the content looks binary.
    pub async fn read_text(&self, id: &ProjectId, path: &str) -> Result<TextFile, WorkspaceError> {
        let root = self.project_root(id)?;
        let resolved = resolve_within(&root, path)?;
        let _guard = self.locks.read(id).await;

        let metadata = match tokio::fs::symlink_metadata(&resolved).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(WorkspaceError::FileNotFound {
                    path: path.to_owned(),
                });
            }
            Err(error) => return Err(WorkspaceError::filesystem(&resolved, error)),
        };
        if !metadata.is_file() {
            return Err(WorkspaceError::FileNotFound {
                path: path.to_owned(),
            });
        }

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|error| WorkspaceError::filesystem(&resolved, error))?;
        if !looks_like_text(&bytes) {
            return Err(WorkspaceError::NotText {
                path: path.to_owned(),
            });
        }
        let content = String::from_utf8(bytes).map_err(|_| WorkspaceError::NotText {
            path: path.to_owned(),
        })?;

        let name = resolved
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(TextFile {
            name,
            path: path.to_owned(),
            content,
        })
    }

    /// Writes `data` to `path` inside the project, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unsafe paths and a filesystem error when
    /// the directories or file cannot be written.
    pub async fn save(&self, id: &ProjectId, path: &str, data: &[u8]) -> Result<(), WorkspaceError> {
        let root = self.project_root(id)?;
        let resolved = resolve_within(&root, path)?;
        let _guard = self.locks.write(id).await;

        if let Some(parent) = resolved.parent() {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(DIRECTORY_MODE);
            builder
                .create(parent)
                .await
                .map_err(|error| WorkspaceError::filesystem(parent, error))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);
        let mut file = options
            .open(&resolved)
            .await
            .map_err(|error| WorkspaceError::filesystem(&resolved, error))?;
        file.write_all(data)
            .await
            .map_err(|error| WorkspaceError::filesystem(&resolved, error))?;
        file.flush()
            .await
            .map_err(|error| WorkspaceError::filesystem(&resolved, error))?;

        debug!(target: TARGET, project = %id, path, bytes = data.len(), "saved file");
        Ok(())
    }

    /// Copies the whole project into `destination` under the project's read
    /// lock, so no save lands part-way through the copy.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::ProjectNotFound`] for unknown projects and
    /// any error raised by [`copy_tree`].
    pub async fn copy_project(
        &self,
        id: &ProjectId,
        destination: &Path,
    ) -> Result<u64, WorkspaceError> {
        let root = self.project_root(id)?;
        let guard = self.locks.read(id).await;
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let copied = copy_tree(&root, &destination);
            drop(guard);
            copied
        })
        .await
        .map_err(WorkspaceError::Worker)?
    }

    /// Takes shared access to the project for the lifetime of the guard.
    ///
    /// Build snapshots hold this while copying so a concurrent save cannot
    /// tear the copy.
    pub async fn read_guard(&self, id: &ProjectId) -> OwnedRwLockReadGuard<()> {
        self.locks.read(id).await
    }
}

fn create_blocking(work_dir: &Path, template_dir: &Path) -> Result<ProjectId, WorkspaceError> {
    std::fs::create_dir_all(work_dir).map_err(|error| WorkspaceError::filesystem(work_dir, error))?;

    for _ in 0..CREATE_ATTEMPTS {
        let id = ProjectId::generate();
        let root = work_dir.join(id.as_str());
        match std::fs::create_dir(&root) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(target: TARGET, project = %id, "project id collided; retrying");
                continue;
            }
            Err(error) => return Err(WorkspaceError::filesystem(&root, error)),
        }

        if template_dir.is_dir()
            && let Err(error) = copy_tree(template_dir, &root)
        {
            if let Err(cleanup) = std::fs::remove_dir_all(&root) {
                debug!(
                    target: TARGET,
                    path = %root.display(),
                    error = %cleanup,
                    "failed to remove partial project"
                );
            }
            return Err(error);
        }
        return Ok(id);
    }

    Err(WorkspaceError::IdSpaceExhausted {
        attempts: CREATE_ATTEMPTS,
    })
}
