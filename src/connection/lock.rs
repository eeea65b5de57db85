// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-project mutual exclusion for automation config read-modify-write cycles.
//!
//! Ops Manager keeps a single automation config per project. Two reconcilers pushing
//! documents for the same project would overwrite each other, so every cycle holds the
//! project's lock from the read until the push has completed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Identity of an Ops Manager project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    /// Project (group) name
    pub project: String,
    /// Organization id
    pub org_id: String,
}

impl ProjectKey {
    /// Key for `project` in organization `org_id`.
    #[must_use]
    pub fn new(project: &str, org_id: &str) -> Self {
        Self {
            project: project.to_string(),
            org_id: org_id.to_string(),
        }
    }
}

/// Keyed async locks, one per (project, organization).
///
/// Cloning is cheap and clones share the same locks.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<ProjectKey, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    /// An empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of a project. The lock is held until the guard drops.
    pub async fn lock(&self, project: &str, org_id: &str) -> OwnedMutexGuard<()> {
        let key = ProjectKey::new(project, org_id);
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        debug!(project = %project, org_id = %org_id, "Waiting for project lock");
        lock.lock_owned().await
    }

    /// Number of projects a lock has been created for.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no lock has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod lock_tests;
