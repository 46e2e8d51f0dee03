//! Domain errors raised while supervising containers and running builds.
//!
//! I/O errors are wrapped in `Arc` to satisfy the `result_large_err` Clippy
//! lint.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use quire_workspace::WorkspaceError;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors raised by the [`crate::Supervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The container runtime client could not be started.
    #[error("failed to start container runtime '{program}': {source}")]
    Spawn {
        /// Runtime client program.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Waiting on the runtime client failed.
    #[error("failed to wait for container runtime: {source}")]
    Wait {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Errors raised by the [`crate::Isolator`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build target path was rejected before any side effect.
    #[error("invalid build target '{target}'")]
    InvalidTarget {
        /// Target as received.
        target: String,
    },

    /// The ephemeral build directory could not be allocated.
    #[error("failed to allocate build directory under '{path}': {source}")]
    BuildDirectory {
        /// Build root.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Copying the project into the build directory failed.
    #[error("failed to snapshot project: {0}")]
    Snapshot(#[source] WorkspaceError),

    /// The container could not be supervised.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The artifact exists but could not be read.
    #[error("failed to read build artifact '{path}': {source}")]
    Artifact {
        /// Artifact path inside the build directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The task driving the build panicked or was cancelled.
    #[error("build task failed: {0}")]
    Worker(#[source] JoinError),

    /// The project could not be resolved.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl BuildError {
    /// Returns true when the container runtime client could not be started.
    #[must_use]
    pub const fn is_runtime_unavailable(&self) -> bool {
        matches!(self, Self::Supervisor(SupervisorError::Spawn { .. }))
    }
}
