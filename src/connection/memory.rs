// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! A connection that keeps the automation config in memory.
//!
//! Used by the offline CLI and by tests that exercise the read-modify-write cycle.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::AutomationConfigConnection;
use crate::deployment::Deployment;
use crate::errors::ConnectionError;

/// In-memory automation config store.
#[derive(Debug)]
pub struct InMemoryConnection {
    project_name: String,
    org_id: String,
    deployment: Mutex<Deployment>,
    reads: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryConnection {
    /// A store for project `project_name` holding `deployment`.
    #[must_use]
    pub fn new(project_name: &str, org_id: &str, deployment: Deployment) -> Self {
        Self {
            project_name: project_name.to_string(),
            org_id: org_id.to_string(),
            deployment: Mutex::new(deployment),
            reads: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// A copy of the stored document.
    pub async fn deployment(&self) -> Deployment {
        self.deployment.lock().await.clone()
    }

    /// Consume the store and return its document.
    #[must_use]
    pub fn into_deployment(self) -> Deployment {
        self.deployment.into_inner()
    }

    /// Number of reads served.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of updates accepted.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AutomationConfigConnection for InMemoryConnection {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn org_id(&self) -> &str {
        &self.org_id
    }

    async fn read_deployment(&self) -> Result<Deployment, ConnectionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.deployment.lock().await.clone())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ConnectionError> {
        *self.deployment.lock().await = deployment.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
