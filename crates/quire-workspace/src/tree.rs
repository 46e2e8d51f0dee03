//! Depth-bounded directory index of a project.
//!
//! The index is what the editor UI renders in its file pane: the project root,
//! its files and directories, and one further level below those. Anything
//! deeper is left out. The reserved `.git` directory is never entered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::TreeError;
use crate::validate::RESERVED_METADATA_DIR;

const TARGET: &str = "quire_workspace::tree";

/// Levels below the root included in the index.
pub const MAX_DEPTH: usize = 2;

/// Name and path of the root node.
pub const ROOT_MARKER: &str = "/";

/// A regular file in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Final path component.
    pub name: String,
    /// `/`-prefixed path relative to the project root.
    pub path: String,
}

/// A directory in the index with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Final path component, or `/` for the root.
    pub name: String,
    /// `/`-prefixed path relative to the project root.
    pub path: String,
    /// Child directories sorted by name.
    #[serde(rename = "childdirs")]
    pub child_dirs: Vec<Directory>,
    /// Child files sorted by name.
    pub children: Vec<FileRef>,
}

impl Directory {
    fn empty(name: String, path: String) -> Self {
        Self {
            name,
            path,
            child_dirs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn root() -> Self {
        Self::empty(ROOT_MARKER.to_owned(), ROOT_MARKER.to_owned())
    }

    fn sort_recursively(&mut self) {
        self.child_dirs
            .sort_by(|left, right| left.name.as_bytes().cmp(right.name.as_bytes()));
        self.children
            .sort_by(|left, right| left.name.as_bytes().cmp(right.name.as_bytes()));
        for child in &mut self.child_dirs {
            child.sort_recursively();
        }
    }

    /// Returns the deepest level present below this node, counting this node
    /// as zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        let below_dirs = self
            .child_dirs
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0);
        if self.children.is_empty() {
            below_dirs
        } else {
            below_dirs.max(1)
        }
    }
}

/// Indexes `root` into a [`Directory`] tree at most [`MAX_DEPTH`] levels deep.
///
/// Symlinks and special files are omitted. Siblings are sorted byte-wise by
/// name.
///
/// # Errors
///
/// Returns [`TreeError::Walk`] naming the offending entry when any part of the
/// walk fails; no partial tree is returned.
pub fn build_tree(root: &Path) -> Result<Directory, TreeError> {
    let mut dirs: BTreeMap<PathBuf, Directory> = BTreeMap::new();
    let mut files: Vec<(PathBuf, FileRef)> = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_DEPTH)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_reserved(entry));

    for entry in walker {
        let entry = entry.map_err(|source| TreeError::walk(root, source))?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let file_type = entry.file_type();
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = display_path(relative);

        if file_type.is_dir() {
            dirs.insert(relative.to_path_buf(), Directory::empty(name, path));
        } else if file_type.is_file() {
            let parent = relative.parent().map(Path::to_path_buf).unwrap_or_default();
            files.push((parent, FileRef { name, path }));
        } else {
            debug!(target: TARGET, path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    let mut tree = Directory::root();
    for (parent, file) in files {
        match dirs.get_mut(&parent) {
            Some(directory) => directory.children.push(file),
            None => tree.children.push(file),
        }
    }

    // Attach deepest directories first so each is complete when moved into
    // its parent.
    let mut ordered: Vec<PathBuf> = dirs.keys().cloned().collect();
    ordered.sort_by_key(|path| std::cmp::Reverse(path.components().count()));
    for key in ordered {
        let Some(directory) = dirs.remove(&key) else {
            continue;
        };
        let parent = key.parent().map(Path::to_path_buf).unwrap_or_default();
        match dirs.get_mut(&parent) {
            Some(owner) => owner.child_dirs.push(directory),
            None => tree.child_dirs.push(directory),
        }
    }

    tree.sort_recursively();
    Ok(tree)
}

fn is_reserved(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name() == RESERVED_METADATA_DIR
}

fn display_path(relative: &Path) -> String {
    let mut rendered = String::new();
    for component in relative.components() {
        rendered.push('/');
        rendered.push_str(&component.as_os_str().to_string_lossy());
    }
    rendered
}
