//! Per-project reader/writer locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::id::ProjectId;

/// One async `RwLock` per project.
///
/// Saves take the write side. Build snapshots take the read side for the
/// duration of the copy only.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<RwLock<()>>>>,
}

impl ProjectLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &ProjectId) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Waits for shared access to the project.
    pub async fn read(&self, id: &ProjectId) -> OwnedRwLockReadGuard<()> {
        self.entry(id).read_owned().await
    }

    /// Waits for exclusive access to the project.
    pub async fn write(&self, id: &ProjectId) -> OwnedRwLockWriteGuard<()> {
        self.entry(id).write_owned().await
    }

    /// Number of projects that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when no project has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
