//! Domain errors raised by workspace operations.
//!
//! I/O errors are wrapped in `Arc` to satisfy the `result_large_err` Clippy
//! lint and to keep the error cheap to clone into responses.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::id::ProjectId;

/// Errors arising while indexing a project directory.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The directory walk failed before completing.
    #[error("failed to traverse '{path}': {source}")]
    Walk {
        /// Entry being visited when the walk failed.
        path: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
}

impl TreeError {
    pub(crate) fn walk(root: &Path, source: walkdir::Error) -> Self {
        let path = source.path().unwrap_or(root).to_path_buf();
        Self::Walk { path, source }
    }
}

/// Errors arising from project workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The project identifier is malformed.
    #[error("invalid project id '{id}'")]
    InvalidId {
        /// Identifier as received.
        id: String,
    },

    /// The path contains a traversal segment or names reserved metadata.
    #[error("invalid path '{path}'")]
    InvalidPath {
        /// Path as received.
        path: String,
    },

    /// The path resolved outside the project root, e.g. through a symlink.
    #[error("path '{path}' escapes the project root")]
    PathEscapesRoot {
        /// Resolved path that left the root.
        path: PathBuf,
    },

    /// No workspace exists for the project.
    #[error("project '{id}' not found")]
    ProjectNotFound {
        /// Identifier that was looked up.
        id: ProjectId,
    },

    /// The requested file does not exist or is not a regular file.
    #[error("file '{path}' not found")]
    FileNotFound {
        /// Project-relative path.
        path: String,
    },

    /// The requested file is not text.
    #[error("'{path}' is not a text file")]
    NotText {
        /// Project-relative path.
        path: String,
    },

    /// A filesystem operation failed.
    #[error("filesystem error at '{path}': {source}")]
    Filesystem {
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Indexing the project tree failed.
    #[error(transparent)]
    Traversal(#[from] TreeError),

    /// Every generated identifier collided with an existing project.
    #[error("no free project id after {attempts} attempts")]
    IdSpaceExhausted {
        /// Number of identifiers tried.
        attempts: usize,
    },

    /// A blocking filesystem task panicked or was cancelled.
    #[error("workspace task failed: {0}")]
    Worker(#[source] tokio::task::JoinError),
}

impl WorkspaceError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true for malformed client input rejected before any side
    /// effect.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. } | Self::InvalidPath { .. } | Self::PathEscapesRoot { .. }
        )
    }

    /// Returns true when the addressed project or file does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ProjectNotFound { .. } | Self::FileNotFound { .. })
    }
}
