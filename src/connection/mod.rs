// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to a project's automation config.
//!
//! A reconciliation is one read-modify-write cycle: take the project lock, read the
//! current document, apply the merge, and push the result if anything changed. See
//! [`read_update_deployment`].
//!
//! # Example
//!
//! ```rust,no_run
//! use om_deployment::connection::{read_update_deployment, InMemoryConnection, ProjectLocks};
//! use om_deployment::deployment::{Deployment, Process};
//!
//! # async fn example() -> Result<(), om_deployment::errors::ConnectionError> {
//! let conn = InMemoryConnection::new("shop", "org-1", Deployment::new());
//! let locks = ProjectLocks::new();
//!
//! read_update_deployment(&conn, &locks, |d| {
//!     d.merge_standalone(Process::new_mongod("standalone", "host-0", "6.0.5", None)?)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod lock;
pub mod memory;

pub use http::HttpConnection;
pub use lock::{ProjectKey, ProjectLocks};
pub use memory::InMemoryConnection;

use tracing::{debug, info, warn};

use crate::deployment::Deployment;
use crate::errors::{ConnectionError, DeploymentError};
use crate::metrics;

/// Read and write access to one Ops Manager project's automation config.
#[async_trait::async_trait]
pub trait AutomationConfigConnection: Send + Sync {
    /// Name of the project the connection points at.
    fn project_name(&self) -> &str;

    /// Organization the project belongs to.
    fn org_id(&self) -> &str;

    /// Fetch the current automation config.
    ///
    /// # Errors
    ///
    /// Transport or HTTP errors, or a decode error if the body is not a document.
    async fn read_deployment(&self) -> Result<Deployment, ConnectionError>;

    /// Replace the automation config with `deployment`.
    ///
    /// # Errors
    ///
    /// Transport or HTTP errors.
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ConnectionError>;
}

/// Run one read-modify-write cycle against the project behind `conn`.
///
/// Holds the project's lock for the whole cycle. When `f` leaves the document
/// unchanged nothing is pushed.
///
/// # Errors
///
/// Any error from reading, from `f`, or from the push. When `f` fails nothing is pushed.
pub async fn read_update_deployment<C, T, F>(
    conn: &C,
    locks: &ProjectLocks,
    f: F,
) -> Result<T, ConnectionError>
where
    C: AutomationConfigConnection + ?Sized,
    F: FnOnce(&mut Deployment) -> Result<T, DeploymentError>,
{
    let project = conn.project_name();
    let _guard = locks.lock(project, conn.org_id()).await;

    let current = conn.read_deployment().await.inspect_err(|e| {
        warn!(project = %project, error = %e, "Failed to read automation config");
        metrics::record_document_update("error");
    })?;

    let mut updated = current.clone();
    let value = f(&mut updated).inspect_err(|e| {
        warn!(project = %project, error = %e, "Automation config change rejected");
        metrics::record_document_update("error");
    })?;

    if updated == current {
        debug!(project = %project, "Automation config unchanged, skipping update");
        metrics::record_document_update("unchanged");
        return Ok(value);
    }

    conn.update_deployment(&updated).await.inspect_err(|e| {
        warn!(project = %project, error = %e, "Failed to push automation config");
        metrics::record_document_update("error");
    })?;

    info!(
        project = %project,
        fingerprint = %updated.fingerprint().unwrap_or_default(),
        "Pushed automation config"
    );
    metrics::record_document_update("pushed");
    Ok(value)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
