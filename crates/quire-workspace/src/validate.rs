//! Path and identifier guards.
//!
//! [`verify_id`] and [`verify_path`] are pure predicates over client input.
//! They must pass before the input is joined with a trusted root.
//! [`resolve_within`] performs that join and then checks the canonical result
//! against the canonical root, catching escapes the textual check cannot see
//! (symlinks inside the project pointing elsewhere).

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::WorkspaceError;

/// Version-control metadata directory that clients may never address.
pub const RESERVED_METADATA_DIR: &str = ".git";

const PARENT_SEGMENT: &str = "..";

/// Returns true iff every character of `id` is a lowercase hex digit.
///
/// The empty string passes. Use [`crate::ProjectId::parse`] where a complete
/// identifier is required.
#[must_use]
pub fn verify_id(id: &str) -> bool {
    id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

/// Returns false when `path` contains a parent-directory segment anywhere or
/// starts with [`RESERVED_METADATA_DIR`]; true otherwise.
///
/// Leading separators are ignored for the metadata check so `/.git/config`
/// is rejected like `.git/config`.
#[must_use]
pub fn verify_path(path: &str) -> bool {
    if path.contains("../") || path.contains("..\\") {
        return false;
    }
    if path.split(['/', '\\']).any(|segment| segment == PARENT_SEGMENT) {
        return false;
    }
    !path
        .trim_start_matches(['/', '\\'])
        .starts_with(RESERVED_METADATA_DIR)
}

/// Joins a client path under `root` and proves the result stays inside it.
///
/// A leading `/` is treated as project-relative, matching the paths the tree
/// index hands out. The deepest existing ancestor of the joined path is
/// canonicalised and must still lie under the canonical root.
///
/// # Errors
///
/// Returns [`WorkspaceError::InvalidPath`] when [`verify_path`] fails or the
/// path has non-normal components, [`WorkspaceError::PathEscapesRoot`] when
/// the canonical location leaves the root, and
/// [`WorkspaceError::Filesystem`] when canonicalisation itself fails.
pub fn resolve_within(root: &Path, path: &str) -> Result<PathBuf, WorkspaceError> {
    if !verify_path(path) {
        return Err(WorkspaceError::InvalidPath {
            path: path.to_owned(),
        });
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(WorkspaceError::InvalidPath {
                    path: path.to_owned(),
                });
            }
        }
    }

    ensure_contained(root, &resolved)?;
    Ok(resolved)
}

fn ensure_contained(root: &Path, candidate: &Path) -> Result<(), WorkspaceError> {
    let canonical_root = root
        .canonicalize()
        .map_err(|source| WorkspaceError::filesystem(root, source))?;

    let Some(existing) = candidate
        .ancestors()
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
    else {
        return Err(WorkspaceError::filesystem(
            candidate,
            io::Error::from(io::ErrorKind::NotFound),
        ));
    };

    let canonical = existing
        .canonicalize()
        .map_err(|source| WorkspaceError::filesystem(existing, source))?;

    if canonical.starts_with(&canonical_root) {
        Ok(())
    } else {
        Err(WorkspaceError::PathEscapesRoot {
            path: candidate.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn project() -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join("chapters")).expect("mkdir");
        fs::write(dir.path().join("chapters").join("intro.saty"), "intro").expect("write");
        dir
    }

    #[rstest]
    #[case("0123456789abcdef", true)]
    #[case("deadbeef", true)]
    #[case("", true)]
    #[case("DEADBEEF", false)]
    #[case("deadbeeg", false)]
    #[case("dead beef", false)]
    #[case("../etc", false)]
    fn verify_id_accepts_only_lowercase_hex(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(verify_id(input), expected, "verify_id({input:?})");
    }

    #[rstest]
    #[case("main.saty", true)]
    #[case("/chapters/intro.saty", true)]
    #[case("chapters/deep/file.txt", true)]
    #[case("notes..txt", true)]
    #[case("gitignore", true)]
    #[case("../secret", false)]
    #[case("chapters/../../secret", false)]
    #[case("chapters/..", false)]
    #[case("..", false)]
    #[case("a/..\\b", false)]
    #[case(".git/config", false)]
    #[case("/.git/config", false)]
    #[case(".gitignore", false)]
    fn verify_path_rejects_traversal_and_metadata(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(verify_path(input), expected, "verify_path({input:?})");
    }

    #[rstest]
    fn resolve_within_joins_project_relative_paths(project: TempDir) {
        let resolved =
            resolve_within(project.path(), "/chapters/intro.saty").expect("path should resolve");
        assert_eq!(resolved, project.path().join("chapters").join("intro.saty"));
    }

    #[rstest]
    fn resolve_within_allows_files_not_yet_created(project: TempDir) {
        let resolved =
            resolve_within(project.path(), "new/dir/file.saty").expect("path should resolve");
        assert!(resolved.starts_with(project.path()));
    }

    #[rstest]
    fn resolve_within_rejects_traversal_before_touching_disk(project: TempDir) {
        let error = resolve_within(project.path(), "../outside").expect_err("must reject");
        assert!(matches!(error, WorkspaceError::InvalidPath { .. }));
    }

    #[cfg(unix)]
    #[rstest]
    fn resolve_within_rejects_symlink_escape(project: TempDir) {
        let outside = TempDir::new().expect("outside dir");
        std::os::unix::fs::symlink(outside.path(), project.path().join("link"))
            .expect("symlink");
        let error = resolve_within(project.path(), "link/file.txt").expect_err("must reject");
        assert!(matches!(error, WorkspaceError::PathEscapesRoot { .. }));
    }
}
