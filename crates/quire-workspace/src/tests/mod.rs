//! Crate-level integration and BDD tests.

use std::fs;
use std::path::Path;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::error::WorkspaceError;
use crate::id::ProjectId;
use crate::store::ProjectStore;
use crate::tree::{MAX_DEPTH, ROOT_MARKER, build_tree};


pub(crate) fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, content).expect("write fixture file");
}

#[fixture]
fn sample_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    write_file(dir.path(), "001.txt", b"one");
    write_file(dir.path(), "002.txt", b"two");
    write_file(dir.path(), "003/001.txt", b"nested");
    dir
}

#[rstest]
fn tree_matches_reference_fixture(sample_project: TempDir) {
    let tree = build_tree(sample_project.path()).expect("tree");

    assert_eq!(tree.name, ROOT_MARKER);
    assert_eq!(tree.path, ROOT_MARKER);
    let names: Vec<_> = tree.children.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, ["001.txt", "002.txt"]);
    assert_eq!(tree.children[0].path, "/001.txt");
    assert_eq!(tree.child_dirs.len(), 1);

    let nested = &tree.child_dirs[0];
    assert_eq!(nested.name, "003");
    assert_eq!(nested.path, "/003");
    assert_eq!(nested.children.len(), 1);
    assert_eq!(nested.children[0].path, "/003/001.txt");
}

#[rstest]
fn tree_omits_content_below_depth_bound(sample_project: TempDir) {
    write_file(sample_project.path(), "003/004/005/006.txt", b"deep");
    write_file(sample_project.path(), "003/004/visible-only-as-dir.txt", b"deep");

    let tree = build_tree(sample_project.path()).expect("tree");
    assert!(tree.depth() <= MAX_DEPTH, "depth was {}", tree.depth());

    let nested = &tree.child_dirs[0];
    assert_eq!(nested.child_dirs.len(), 1);
    let bounded = &nested.child_dirs[0];
    assert_eq!(bounded.path, "/003/004");
    assert!(bounded.children.is_empty());
    assert!(bounded.child_dirs.is_empty());
}

#[rstest]
fn tree_skips_version_control_metadata(sample_project: TempDir) {
    write_file(sample_project.path(), ".git/HEAD", b"ref: refs/heads/main");
    let tree = build_tree(sample_project.path()).expect("tree");
    assert!(tree.child_dirs.iter().all(|dir| dir.name != ".git"));
}

#[rstest]
fn tree_of_empty_project_is_bare_root() {
    let dir = TempDir::new().expect("temp dir");
    let tree = build_tree(dir.path()).expect("tree");
    assert!(tree.children.is_empty());
    assert!(tree.child_dirs.is_empty());
}

#[rstest]
fn tree_serialises_with_ui_field_names(sample_project: TempDir) {
    let tree = build_tree(sample_project.path()).expect("tree");
    let json = serde_json::to_value(&tree).expect("serialise");
    assert_eq!(json["name"], "/");
    assert!(json["childdirs"].is_array());
    assert_eq!(json["childdirs"][0]["children"][0]["path"], "/003/001.txt");
}

#[rstest]
fn tree_fails_when_root_is_missing() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("absent");
    assert!(build_tree(&missing).is_err());
}

#[cfg(unix)]
#[rstest]
fn tree_fails_whole_call_on_unreadable_directory(sample_project: TempDir) {
    use std::os::unix::fs::PermissionsExt;

    let locked = sample_project.path().join("003");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
    let listing = fs::read_dir(&locked);
    let result = build_tree(sample_project.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("restore");

    // Privileged users can read the directory regardless of its mode.
    if listing.is_err() {
        let error = result.expect_err("walk should fail");
        assert!(error.to_string().contains("003"), "{error}");
    }
}

#[rstest]
#[tokio::test]
async fn unknown_project_is_not_found() {
    let work = TempDir::new().expect("temp dir");
    let store = ProjectStore::new(work.path(), work.path().join("template"));
    let id = ProjectId::parse("0123456789abcdef").expect("id");
    let error = store.tree(&id).await.expect_err("missing project");
    assert!(matches!(error, WorkspaceError::ProjectNotFound { .. }));
}
