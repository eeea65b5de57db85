// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # om-deployment - Ops Manager automation config merge engine
//!
//! Drives an Ops Manager automation config toward a desired MongoDB topology. The
//! automation config is a JSON document shared by every resource of a project; this
//! crate merges the processes, replica sets and sharded clusters a caller wants into it
//! while keeping whatever Ops Manager or its users changed in fields the caller does not
//! own.
//!
//! ## Modules
//!
//! - [`deployment`] - The document model, merges, removals and queries
//! - [`topology`] - Desired topologies (YAML/JSON) and their conversion into entities
//! - [`connection`] - Reading and pushing automation configs, per-project locking
//! - [`errors`] - Error types
//! - [`retry`] - Exponential backoff for Ops Manager requests
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use om_deployment::deployment::{Deployment, MemberOptions, Process, ReplicaSetWithProcesses};
//!
//! let processes = (0..3)
//!     .map(|i| Process::new_mongod(&format!("shop-{i}"), &format!("shop-{i}.svc"), "6.0.5", None))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! let replica_set = ReplicaSetWithProcesses::new("shop", processes, &[MemberOptions::default()]).unwrap();
//!
//! let mut deployment = Deployment::new();
//! let removed = deployment.merge_replica_set(replica_set).unwrap();
//! assert!(removed.is_empty());
//! ```
//!
//! ## Guarantees
//!
//! - **Non-destructive** - Unknown fields and foreign entities are carried through merges
//! - **Atomic** - A failed merge leaves the document unchanged
//! - **Idempotent** - Merging the same desired state twice changes nothing the second time

pub mod cli;
pub mod connection;
pub mod constants;
pub mod deployment;
pub mod errors;
pub mod metrics;
pub mod retry;
pub mod topology;
