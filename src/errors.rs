// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for automation-config merges and Ops Manager connections.
//!
//! Two families of failures exist:
//!
//! - **Structural** errors ([`DeploymentError::Structure`]) mean the document Ops Manager
//!   returned does not have the shape this crate relies on (e.g. `members` is not an array).
//!   They signal a contract breach with the upstream API or an earlier corruption and are
//!   never patched around.
//! - **Validation** errors (dangling references, missing entities, wrong process types)
//!   are recoverable. The caller decides whether to abort the reconciliation attempt for
//!   the affected resource.
//!
//! Merge entry points are atomic: when they return an error the document is unchanged.

use thiserror::Error;

/// Result alias used throughout the deployment model.
pub type Result<T, E = DeploymentError> = std::result::Result<T, E>;

/// Errors raised while reading, merging or validating an automation-config document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeploymentError {
    /// A document value does not have the expected JSON shape.
    ///
    /// Raised eagerly at the accessor boundary, e.g. when `replicaSets[0].members` is a
    /// string or a process has no `name`.
    #[error("Unexpected document structure at '{path}': expected {expected}, found {found}")]
    Structure {
        /// Dotted path of the offending value (e.g. `replicaSets[1].members`)
        path: String,
        /// Shape the code expected
        expected: &'static str,
        /// Shape that was actually present (`missing` when the key is absent)
        found: &'static str,
    },

    /// An entity references another entity that is not present in the document.
    #[error("{owner} references {kind} '{name}' which does not exist in the deployment")]
    DanglingReference {
        /// Human-readable description of the referencing entity
        owner: String,
        /// Kind of the referenced entity (`process`, `replica set`)
        kind: &'static str,
        /// Name of the unresolved reference
        name: String,
    },

    /// Two entities of the same kind share an identity key.
    #[error("Duplicate {kind} '{name}' in deployment")]
    DuplicateIdentity {
        /// Entity kind (`process`, `replica set`, `replica set member`, `sharded cluster`)
        kind: &'static str,
        /// The duplicated identity key
        name: String,
    },

    /// No process with the given name exists.
    #[error("Process '{name}' does not exist")]
    ProcessNotFound {
        /// Process name that was looked up
        name: String,
    },

    /// No replica set with the given name exists.
    #[error("Replica set '{name}' does not exist")]
    ReplicaSetNotFound {
        /// Replica set name that was looked up
        name: String,
    },

    /// No sharded cluster with the given name exists.
    #[error("Sharded cluster '{name}' does not exist")]
    ShardedClusterNotFound {
        /// Cluster name that was looked up
        name: String,
    },

    /// Some requested members are not part of the replica set.
    #[error("Failed to find the following members of replica set '{replica_set}': {}", members.join(", "))]
    MembersNotFound {
        /// Replica set that was searched
        replica_set: String,
        /// Member hosts that were not found
        members: Vec<String>,
    },

    /// A process has the wrong `processType` for the role it is merged into.
    #[error("Process '{name}' has processType '{actual}', expected '{expected}'")]
    InvalidProcessType {
        /// Process name
        name: String,
        /// Required process type
        expected: &'static str,
        /// Process type found on the process
        actual: String,
    },

    /// A MongoDB version string could not be parsed.
    #[error("Invalid MongoDB version '{version}': {reason}")]
    InvalidVersion {
        /// Version string as supplied
        version: String,
        /// Parser error
        reason: String,
    },

    /// The document could not be (de)serialized.
    #[error("Failed to (de)serialize deployment: {reason}")]
    Json {
        /// Underlying serde error message
        reason: String,
    },
}

impl DeploymentError {
    /// Returns `true` for structural-assumption violations.
    ///
    /// These are not recoverable by retrying; everything else is a validation error
    /// the reconciler may surface as a pending/failed status.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structure { .. } | Self::Json { .. })
    }

    /// Short, stable label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Structure { .. } => "structure",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::DuplicateIdentity { .. } => "duplicate_identity",
            Self::ProcessNotFound { .. }
            | Self::ReplicaSetNotFound { .. }
            | Self::ShardedClusterNotFound { .. }
            | Self::MembersNotFound { .. } => "not_found",
            Self::InvalidProcessType { .. } => "invalid_process_type",
            Self::InvalidVersion { .. } => "invalid_version",
            Self::Json { .. } => "json",
        }
    }
}

impl From<serde_json::Error> for DeploymentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            reason: err.to_string(),
        }
    }
}

/// Errors raised by [`crate::connection::AutomationConfigConnection`] implementations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Ops Manager answered with a non-success status code.
    #[error("Ops Manager returned HTTP {status} for {method} {url}: {body}")]
    Http {
        /// HTTP method of the request
        method: &'static str,
        /// Request URL
        url: String,
        /// Response status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("{method} {url} failed: {source}")]
    Transport {
        /// HTTP method of the request
        method: &'static str,
        /// Request URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The configured Ops Manager base URL is unusable.
    #[error("Invalid Ops Manager URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as configured
        url: String,
        /// Parse error
        reason: String,
    },

    /// Retries were exhausted on a transient error.
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last error observed
        last: Box<ConnectionError>,
    },

    /// The document was rejected by the merge engine or could not be decoded.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

impl ConnectionError {
    /// Returns `true` if the request may succeed when retried (429, 5xx, transport errors).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => reqwest::StatusCode::from_u16(*status)
                .map(crate::retry::is_retryable_http_status)
                .unwrap_or(false),
            Self::Transport { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            Self::InvalidUrl { .. } | Self::RetriesExhausted { .. } | Self::Deployment(_) => false,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
