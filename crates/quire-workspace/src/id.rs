//! Opaque project identifiers.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;
use crate::validate::verify_id;

/// Number of random bytes behind each identifier.
const ID_BYTES: usize = 8;

/// Hex-encodes `len` bytes from the operating system's secure RNG.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut buffer = vec![0_u8; len];
    OsRng.fill_bytes(&mut buffer);
    hex::encode(buffer)
}

/// Identifier of a project workspace: 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Length of the textual form.
    pub const LEN: usize = ID_BYTES * 2;

    /// Draws a fresh identifier. Uniqueness against existing projects is the
    /// caller's concern.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_hex(ID_BYTES))
    }

    /// Parses a client-supplied identifier.
    ///
    /// Unlike the bare [`verify_id`] predicate this also requires the exact
    /// length, so the empty string is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::InvalidId`] for anything other than
    /// [`ProjectId::LEN`] lowercase hex characters.
    pub fn parse(id: &str) -> Result<Self, WorkspaceError> {
        if id.len() == Self::LEN && verify_id(id) {
            Ok(Self(id.to_owned()))
        } else {
            Err(WorkspaceError::InvalidId { id: id.to_owned() })
        }
    }

    /// Borrows the textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = WorkspaceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = WorkspaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
