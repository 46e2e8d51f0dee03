//! Project workspaces for the Quire build service.
//!
//! A project is a directory of document sources under the configured work
//! directory, named by an opaque [`ProjectId`]. This crate owns everything
//! that touches those directories on behalf of a client:
//!
//! - [`validate`] guards every client-supplied identifier and path before it
//!   is joined with a trusted root, and re-checks containment afterwards.
//! - [`tree`] indexes a project into the depth-bounded [`Directory`] view the
//!   editor UI renders.
//! - [`ProjectStore`] creates projects from a template, reads text files and
//!   saves uploads, serialising writers per project through
//!   [`ProjectLocks`].
//! - [`copy_tree`] clones a project into an ephemeral build directory.
//!
//! The crate never deletes a project. Retention is an operator concern.

mod content;
mod copy;
mod error;
mod id;
mod locks;
mod store;
pub mod tree;
pub mod validate;

#[cfg(test)]
mod tests;

pub use self::content::looks_like_text;
pub use self::copy::copy_tree;
pub use self::error::{TreeError, WorkspaceError};
pub use self::id::{ProjectId, random_hex};
pub use self::locks::ProjectLocks;
pub use self::store::{ProjectStore, TextFile};
pub use self::tree::{Directory, FileRef, build_tree};
pub use self::validate::{resolve_within, verify_id, verify_path};
