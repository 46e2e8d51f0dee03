//! Recursive tree copy used for templates and build snapshots.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{TreeError, WorkspaceError};

const TARGET: &str = "quire_workspace::copy";

/// Copies every directory and regular file under `source` into `destination`,
/// returning the number of files copied.
///
/// `destination` is created when missing. Symlinks are skipped so a project
/// cannot smuggle host files into a build through a link.
///
/// # Errors
///
/// Returns [`WorkspaceError::Traversal`] when the source walk fails and
/// [`WorkspaceError::Filesystem`] when a directory or file cannot be written.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<u64, WorkspaceError> {
    fs::create_dir_all(destination)
        .map_err(|error| WorkspaceError::filesystem(destination, error))?;

    let mut copied = 0_u64;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|error| TreeError::walk(source, error))?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|error| WorkspaceError::filesystem(&target, error))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)
                .map_err(|error| WorkspaceError::filesystem(&target, error))?;
            copied += 1;
        } else {
            debug!(target: TARGET, path = %entry.path().display(), "not copying non-regular entry");
        }
    }

    debug!(
        target: TARGET,
        source = %source.display(),
        destination = %destination.display(),
        files = copied,
        "copied tree"
    );
    Ok(copied)
}
