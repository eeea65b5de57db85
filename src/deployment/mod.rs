// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The automation config document and its merge engine.
//!
//! [`Deployment`] wraps the JSON object Ops Manager serves at
//! `/groups/{id}/automationConfig`. The document is kept as a generic, ordered JSON tree;
//! processes, replica sets and sharded clusters are lenses over parts of it, so keys this
//! crate does not know about survive every merge untouched.
//!
//! # Merge entry points
//!
//! - [`Deployment::merge_standalone`]
//! - [`Deployment::merge_replica_set`]
//! - [`Deployment::merge_sharded_cluster`]
//!
//! Every mutating entry point either fully succeeds or leaves the document exactly as it
//! was. Merges perform no I/O; fetching and pushing the document is the job of
//! [`crate::connection`].
//!
//! # Example
//!
//! ```rust
//! use om_deployment::deployment::{Deployment, Process, ReplicaSetWithProcesses};
//!
//! # fn main() -> Result<(), om_deployment::errors::DeploymentError> {
//! let mut deployment = Deployment::new();
//! let processes = (0..3)
//!     .map(|i| Process::new_mongod(&format!("blue-{i}"), &format!("blue-{i}.svc"), "4.0.6", None))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let removed = deployment.merge_replica_set(ReplicaSetWithProcesses::new("blue", processes, &[])?)?;
//! assert!(removed.is_empty());
//! assert_eq!(deployment.number_of_processes()?, 3);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub mod process;
pub mod replica_set;
pub mod sharded_cluster;
pub mod value;
pub mod version;

pub use process::{AdditionalConfig, Process, ProcessType, ProcessView, ProcessViewMut, TlsMode};
pub use replica_set::{
    MemberOptions, ReplicaSet, ReplicaSetMember, ReplicaSetView, ReplicaSetViewMut,
    ReplicaSetWithProcesses,
};
pub use sharded_cluster::{
    Shard, ShardedCluster, ShardedClusterMerge, ShardedClusterSpec, ShardedClusterView,
    ShardedClusterViewMut,
};
pub use value::Object;

use self::value::{
    element_object, element_object_mut, get_array, get_integer, get_str, missing_error,
    read_or_create_array, read_or_create_map, require_str, structure_error, tls_key,
};
use self::version::parse_version;
use crate::constants::{
    BACKUP_AGENT_DEFAULT_VERSION, BACKUP_VERSIONS_KEY, CA_FILE_PATH_IN_CONTAINER,
    CLIENT_CERTIFICATE_MODE_OPTIONAL, MONITORING_AGENT_DEFAULT_VERSION, MONITORING_VERSIONS_KEY,
    PROCESSES_KEY, REPLICA_SETS_KEY, SHARDING_KEY, TLS_KEY,
};
use crate::errors::{DeploymentError, Result};
use crate::metrics;

/// Kind of resource a set of processes belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A single process
    Standalone,
    /// A replica set and its members
    ReplicaSet,
    /// Mongos, config server and shard processes of a cluster
    ShardedCluster,
}

impl ResourceKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::ReplicaSet => "replica_set",
            Self::ShardedCluster => "sharded_cluster",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An Ops Manager automation config document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Deployment(Object);

impl Default for Deployment {
    fn default() -> Self {
        Self::new()
    }
}

impl<'de> Deserialize<'de> for Deployment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let obj = Object::deserialize(deserializer)?;
        Self::from_object(obj).map_err(serde::de::Error::custom)
    }
}

impl Deployment {
    // ========================================================================
    // Construction and serialization
    // ========================================================================

    /// An empty deployment with the keys Ops Manager expects on a new project.
    #[must_use]
    pub fn new() -> Self {
        let mut obj = Object::new();
        for key in [
            PROCESSES_KEY,
            REPLICA_SETS_KEY,
            SHARDING_KEY,
            MONITORING_VERSIONS_KEY,
            BACKUP_VERSIONS_KEY,
        ] {
            obj.insert(key.into(), Value::Array(Vec::new()));
        }
        obj.insert("auth".into(), Value::Object(Object::new()));
        obj.insert(
            TLS_KEY.into(),
            json!({
                "clientCertificateMode": CLIENT_CERTIFICATE_MODE_OPTIONAL,
                "CAFilePath": CA_FILE_PATH_IN_CONTAINER,
            }),
        );
        Self(obj)
    }

    /// Wrap a document received from Ops Manager. Keys are kept as received, including
    /// both `tls` and the legacy `ssl` when a document carries them.
    ///
    /// # Errors
    ///
    /// Structural error if `processes` is not an array of objects.
    pub fn from_object(obj: Object) -> Result<Self> {
        if let Some(items) = get_array(&obj, PROCESSES_KEY, "")? {
            for (i, item) in items.iter().enumerate() {
                element_object(item, PROCESSES_KEY, i)?;
            }
        }
        Ok(Self(obj))
    }

    /// Build from any JSON value; the value must be an object.
    ///
    /// # Errors
    ///
    /// Structural error if `value` is not an object or has an unexpected shape.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Self::from_object(obj),
            other => Err(structure_error("<document>".to_string(), "object", &other)),
        }
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::Json`] for invalid JSON, structural errors as in [`Self::from_value`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::Json`] if serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// The document as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// The underlying JSON object.
    #[must_use]
    pub fn object(&self) -> &Object {
        &self.0
    }

    /// Unwrap into the underlying JSON object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }

    /// Ops Manager's document `version` counter, `-1` when absent.
    ///
    /// # Errors
    ///
    /// Structural error if `version` is not an integer.
    pub fn version(&self) -> Result<i64> {
        Ok(get_integer(&self.0, "version", "")?.unwrap_or(-1))
    }

    /// SHA-256 of the serialized document, hex encoded.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::Json`] if serialization fails.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(format!("{:x}", Sha256::digest(self.to_vec()?)))
    }

    /// Enable deployment-wide TLS with the given CA file, or remove the TLS settings.
    ///
    /// Settings go under `tls`, or under `ssl` when the document only has the legacy key.
    ///
    /// # Errors
    ///
    /// Structural error if the TLS settings are not an object.
    pub fn configure_tls(&mut self, ca_file_path: Option<&str>) -> Result<()> {
        let key = tls_key(&self.0);
        match ca_file_path {
            Some(path) => {
                read_or_create_map(&mut self.0, key, "")?
                    .insert("CAFilePath".into(), json!(path));
            }
            None => {
                self.0.remove(key);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Entity lookup
    // ========================================================================

    fn entries(&self, key: &str) -> Result<Vec<&Object>> {
        let Some(items) = get_array(&self.0, key, "")? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| element_object(v, key, i))
            .collect()
    }

    fn entry_mut(&mut self, key: &str, index: usize) -> Result<&mut Object> {
        let items = read_or_create_array(&mut self.0, key, "")?;
        match items.get_mut(index) {
            Some(item) => element_object_mut(item, key, index),
            None => Err(missing_error(format!("{key}[{index}]"), "object")),
        }
    }

    fn push_entry(&mut self, key: &str, entry: Object) -> Result<()> {
        read_or_create_array(&mut self.0, key, "")?.push(Value::Object(entry));
        Ok(())
    }

    /// Position of the entry of `key` whose `id_key` equals `name`.
    fn position(&self, key: &str, id_key: &str, name: &str) -> Result<Option<usize>> {
        for (i, entry) in self.entries(key)?.into_iter().enumerate() {
            if require_str(entry, id_key, &format!("{key}[{i}]"))? == name {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Keep only the entries of `key` for which `keep` holds (in document order).
    fn retain_entries(&mut self, key: &str, keep: Vec<bool>) -> Result<()> {
        if let Some(items) = get_array_mut(&mut self.0, key)? {
            let mut flags = keep.into_iter();
            items.retain(|_| flags.next().unwrap_or(true));
        }
        Ok(())
    }

    /// All processes in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `processes` is not an array of objects.
    pub fn processes(&self) -> Result<Vec<ProcessView<'_>>> {
        Ok(self
            .entries(PROCESSES_KEY)?
            .into_iter()
            .map(ProcessView::view)
            .collect())
    }

    /// Find a process by name.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn find_process(&self, name: &str) -> Result<Option<ProcessView<'_>>> {
        for process in self.processes()? {
            if process.name()? == name {
                return Ok(Some(process));
            }
        }
        Ok(None)
    }

    fn process_mut(&mut self, name: &str) -> Result<Option<ProcessViewMut<'_>>> {
        match self.position(PROCESSES_KEY, "name", name)? {
            Some(i) => Ok(Some(ProcessViewMut::view_mut(self.entry_mut(PROCESSES_KEY, i)?))),
            None => Ok(None),
        }
    }

    /// All replica sets in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `replicaSets` is not an array of objects.
    pub fn replica_sets(&self) -> Result<Vec<ReplicaSetView<'_>>> {
        Ok(self
            .entries(REPLICA_SETS_KEY)?
            .into_iter()
            .map(ReplicaSetView::view)
            .collect())
    }

    /// Find a replica set by name.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn find_replica_set(&self, name: &str) -> Result<Option<ReplicaSetView<'_>>> {
        for replica_set in self.replica_sets()? {
            if replica_set.name()? == name {
                return Ok(Some(replica_set));
            }
        }
        Ok(None)
    }

    fn replica_set_mut(&mut self, name: &str) -> Result<Option<ReplicaSetViewMut<'_>>> {
        match self.position(REPLICA_SETS_KEY, "_id", name)? {
            Some(i) => Ok(Some(ReplicaSetViewMut::view_mut(
                self.entry_mut(REPLICA_SETS_KEY, i)?,
            ))),
            None => Ok(None),
        }
    }

    /// All sharded clusters in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `sharding` is not an array of objects.
    pub fn sharded_clusters(&self) -> Result<Vec<ShardedClusterView<'_>>> {
        Ok(self
            .entries(SHARDING_KEY)?
            .into_iter()
            .map(ShardedClusterView::view)
            .collect())
    }

    /// Find a sharded cluster by name.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn find_sharded_cluster(&self, name: &str) -> Result<Option<ShardedClusterView<'_>>> {
        for cluster in self.sharded_clusters()? {
            if cluster.name()? == name {
                return Ok(Some(cluster));
            }
        }
        Ok(None)
    }

    fn sharded_cluster_mut(&mut self, name: &str) -> Result<Option<ShardedClusterViewMut<'_>>> {
        match self.position(SHARDING_KEY, "name", name)? {
            Some(i) => Ok(Some(ShardedClusterViewMut::view_mut(
                self.entry_mut(SHARDING_KEY, i)?,
            ))),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Merges
    // ========================================================================

    /// Run `f` against a copy of the document and keep the result only if it succeeds.
    fn stage<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut staged = self.clone();
        let out = f(&mut staged)?;
        *self = staged;
        Ok(out)
    }

    /// Merge a single process: the operator-owned fields are overlaid onto the process of
    /// the same name, or the process is appended when the deployment lacks it.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch; the document is unchanged on error.
    pub fn merge_standalone(&mut self, process: Process) -> Result<()> {
        self.merge_standalone_with_config(process, &AdditionalConfig::default())
    }

    /// [`Self::merge_standalone`] with extra `args2_6` settings.
    ///
    /// `config.desired` is deep-merged into the process arguments; keys only
    /// `config.previous` has are removed from the existing process.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch; the document is unchanged on error.
    pub fn merge_standalone_with_config(
        &mut self,
        mut process: Process,
        config: &AdditionalConfig,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.stage(|d| {
            process.merge_args(&config.desired)?;
            d.merge_process(&process, config)
        });
        observe("merge_standalone", started, result)
    }

    fn merge_process<P: std::borrow::Borrow<Object>>(
        &mut self,
        desired: &Process<P>,
        config: &AdditionalConfig,
    ) -> Result<()> {
        let name = desired.name()?;
        match self.process_mut(name)? {
            Some(mut existing) => {
                existing.merge_from(desired)?;
                existing.remove_dropped_args(config)?;
                debug!(process = %name, "Merged process into existing one");
            }
            None => {
                self.push_entry(PROCESSES_KEY, desired.object().clone())?;
                debug!(process = %name, "Added process as the deployment didn't have it");
            }
        }
        Ok(())
    }

    /// Merge a replica set and its processes.
    ///
    /// On scale-up, new processes start as copies of an existing member's process so
    /// Ops Manager side changes carry over. Members the desired replica set no longer lists
    /// are dropped together with their processes; their names are returned, sorted, for
    /// monitoring deregistration. No more than seven members keep a vote.
    ///
    /// # Errors
    ///
    /// Structural errors, [`DeploymentError::DuplicateIdentity`] for repeated members,
    /// [`DeploymentError::DanglingReference`] if a member has no process. The document is
    /// unchanged on error.
    pub fn merge_replica_set(&mut self, replica_set: ReplicaSetWithProcesses) -> Result<Vec<String>> {
        let started = Instant::now();
        let result = self.stage(|d| d.merge_replica_set_with_processes(&replica_set));
        if let Ok(removed) = &result {
            metrics::record_removed("process", removed.len());
        }
        observe("merge_replica_set", started, result)
    }

    fn merge_replica_set_with_processes(&mut self, desired: &ReplicaSetWithProcesses) -> Result<Vec<String>> {
        let name = desired.name()?;

        let current_members = match self.find_replica_set(name)? {
            Some(existing) => Some(existing.members()?.len()),
            None => None,
        };
        if let Some(current) = current_members {
            if desired.replica_set.members()?.len() > current {
                self.copy_sample_process(&desired.processes, current)?;
            }
        }

        for process in &desired.processes {
            let mut process = process.clone();
            process.set_replica_set_name(name)?;
            self.merge_process(&process, &desired.additional_config)?;
        }

        let removed = match self.replica_set_mut(name)? {
            Some(mut existing) => {
                let removed = existing.merge_from(&desired.replica_set)?;
                debug!(replica_set = %name, "Merged replica set into existing one");
                removed
            }
            None => {
                self.push_entry(REPLICA_SETS_KEY, desired.replica_set.object().clone())?;
                debug!(replica_set = %name, "Added replica set as the deployment didn't have it");
                Vec::new()
            }
        };

        if !removed.is_empty() {
            self.remove_processes(&removed)?;
            debug!(replica_set = %name, removed = ?removed, "Removed processes dropped from replica set");
        }

        if let Some(mut merged) = self.replica_set_mut(name)? {
            merged.limit_voting_members()?;
        }
        self.check_replica_set(name)?;
        Ok(removed)
    }

    /// Clone the first desired process that already exists in the deployment into every
    /// new position (from `first_new` on) that has no process yet. `alias` is not copied.
    fn copy_sample_process(&mut self, desired: &[Process], first_new: usize) -> Result<()> {
        let mut sample = None;
        for process in desired {
            if let Some(existing) = self.find_process(process.name()?)? {
                sample = Some(existing.object().clone());
                break;
            }
        }
        let Some(sample) = sample else {
            return Ok(());
        };

        for process in desired.iter().skip(first_new) {
            let name = process.name()?;
            if self.find_process(name)?.is_some() {
                continue;
            }
            let mut obj = sample.clone();
            obj.remove("alias");
            let mut copy = Process::from_object(obj);
            copy.set_name(name);
            debug!(process = %name, "Added a copy of an existing process for the new member");
            self.push_entry(PROCESSES_KEY, copy.into_object())?;
        }
        Ok(())
    }

    /// Merge a sharded cluster: mongos processes, the config server replica set, every
    /// shard replica set and finally the cluster entry.
    ///
    /// Shards no longer listed are dropped from the cluster entry and reported in
    /// [`ShardedClusterMerge::removed_shards`], but their replica sets and processes stay.
    /// Decommissioning them is up to the caller, see [`Self::mark_shards_draining`] and
    /// [`Self::finalize_shard_removal`].
    ///
    /// # Errors
    ///
    /// [`DeploymentError::InvalidProcessType`] for a non-mongos router process, the replica
    /// set merge errors, and [`DeploymentError::DanglingReference`] if the merged cluster
    /// references a missing replica set. The document is unchanged on error.
    pub fn merge_sharded_cluster(&mut self, spec: &ShardedClusterSpec) -> Result<ShardedClusterMerge> {
        let started = Instant::now();
        let result = self.stage(|d| d.merge_sharded_cluster_spec(spec));
        if let Ok(merge) = &result {
            metrics::record_removed("process", merge.removed_processes.len());
            metrics::record_removed("shard", merge.removed_shards.len());
        }
        observe("merge_sharded_cluster", started, result)
    }

    fn merge_sharded_cluster_spec(&mut self, spec: &ShardedClusterSpec) -> Result<ShardedClusterMerge> {
        let name = spec.name.as_str();
        let mut removed_processes = self.merge_mongos_processes(name, &spec.mongos, &spec.mongos_config)?;

        let mut config_server = spec.config_server.clone();
        for process in &mut config_server.processes {
            process.set_cluster_role_config_server()?;
        }
        removed_processes.extend(self.merge_replica_set_with_processes(&config_server)?);

        for shard in &spec.shards {
            removed_processes.extend(self.merge_replica_set_with_processes(shard)?);
        }

        let desired = spec.to_cluster()?;
        let removed_shards = match self.sharded_cluster_mut(name)? {
            Some(mut existing) => {
                let removed = existing.merge_from(&desired)?;
                debug!(cluster = %name, "Merged sharded cluster into existing one");
                removed
            }
            None => {
                self.push_entry(SHARDING_KEY, desired.into_object())?;
                debug!(cluster = %name, "Added sharded cluster as the deployment didn't have it");
                Vec::new()
            }
        };
        if !removed_shards.is_empty() {
            info!(
                cluster = %name,
                shards = ?removed_shards,
                "Shards removed from sharded cluster, their replica sets are kept until finalized"
            );
        }

        self.check_sharded_cluster(name)?;

        removed_processes.sort();
        removed_processes.dedup();
        Ok(ShardedClusterMerge {
            removed_shards,
            removed_processes,
        })
    }

    fn merge_mongos_processes(
        &mut self,
        cluster: &str,
        mongos: &[Process],
        config: &AdditionalConfig,
    ) -> Result<Vec<String>> {
        for process in mongos {
            let actual = process.process_type()?;
            if actual != ProcessType::Mongos {
                return Err(DeploymentError::InvalidProcessType {
                    name: process.name()?.to_string(),
                    expected: ProcessType::Mongos.as_str(),
                    actual: actual.to_string(),
                });
            }
        }

        let desired: HashSet<&str> = mongos.iter().map(Process::name).collect::<Result<_>>()?;
        let redundant: Vec<String> = self
            .mongos_process_names(cluster)?
            .into_iter()
            .filter(|name| !desired.contains(name.as_str()))
            .collect();
        let removed = self.remove_processes(&redundant)?;
        if !removed.is_empty() {
            debug!(cluster = %cluster, removed = ?removed, "Removed redundant mongos processes");
        }

        let existing = self.mongos_process_names(cluster)?.len();
        if existing > 0 && existing < mongos.len() {
            self.copy_sample_process(mongos, existing)?;
        }

        for process in mongos {
            let mut process = process.clone();
            process.set_cluster(cluster);
            process.merge_args(&config.desired)?;
            self.merge_process(&process, config)?;
        }
        Ok(removed)
    }

    fn mongos_process_names(&self, cluster: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for process in self.processes()? {
            if process.process_type()? == ProcessType::Mongos && process.cluster()? == Some(cluster) {
                names.push(process.name()?.to_string());
            }
        }
        Ok(names)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a process, its replica set memberships and its agent entries.
    ///
    /// Agents are matched by hostname, so other processes on the same host lose their
    /// monitoring and backup agents too.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ProcessNotFound`] if no process has that name.
    pub fn remove_process_by_name(&mut self, name: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.stage(|d| {
            if d.find_process(name)?.is_none() {
                return Err(DeploymentError::ProcessNotFound {
                    name: name.to_string(),
                });
            }
            d.remove_processes(&[name.to_string()])?;
            info!(process = %name, "Removed process");
            Ok(())
        });
        if result.is_ok() {
            metrics::record_removed("process", 1);
        }
        observe("remove_process", started, result)
    }

    /// Remove a replica set and every process that belongs to it. Returns the removed
    /// process names, sorted.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ReplicaSetNotFound`] if absent, [`DeploymentError::DanglingReference`]
    /// if a sharded cluster still uses the replica set.
    pub fn remove_replica_set_by_name(&mut self, name: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        let result = self.stage(|d| {
            if d.find_replica_set(name)?.is_none() {
                return Err(DeploymentError::ReplicaSetNotFound {
                    name: name.to_string(),
                });
            }
            for cluster in d.sharded_clusters()? {
                if cluster.all_replica_sets()?.contains(&name) {
                    return Err(DeploymentError::DanglingReference {
                        owner: format!("sharded cluster '{}'", cluster.name()?),
                        kind: "replica set",
                        name: name.to_string(),
                    });
                }
            }
            let removed = d.remove_replica_sets(&[name.to_string()])?;
            info!(replica_set = %name, processes = ?removed, "Removed replica set");
            Ok(removed)
        });
        if let Ok(removed) = &result {
            metrics::record_removed("replica_set", 1);
            metrics::record_removed("process", removed.len());
        }
        observe("remove_replica_set", started, result)
    }

    /// Remove a sharded cluster: the cluster entry, its config server and shard replica
    /// sets, their processes and the cluster's mongos processes. Returns the removed
    /// process names, sorted. Entities of other resources are untouched.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ShardedClusterNotFound`] if absent.
    pub fn remove_sharded_cluster_by_name(&mut self, name: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        let result = self.stage(|d| {
            let replica_sets: Vec<String> = match d.find_sharded_cluster(name)? {
                Some(cluster) => cluster
                    .all_replica_sets()?
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                None => {
                    return Err(DeploymentError::ShardedClusterNotFound {
                        name: name.to_string(),
                    })
                }
            };

            let keep = d
                .sharded_clusters()?
                .iter()
                .map(|c| c.name().map(|n| n != name))
                .collect::<Result<Vec<_>>>()?;
            d.retain_entries(SHARDING_KEY, keep)?;

            let mut removed = d.remove_replica_sets(&replica_sets)?;
            let mongos = d.mongos_process_names(name)?;
            removed.extend(d.remove_processes(&mongos)?);
            removed.sort();
            removed.dedup();

            info!(cluster = %name, replica_sets = ?replica_sets, processes = ?removed, "Removed sharded cluster");
            Ok(removed)
        });
        if let Ok(removed) = &result {
            metrics::record_removed("sharded_cluster", 1);
            metrics::record_removed("process", removed.len());
        }
        observe("remove_sharded_cluster", started, result)
    }

    /// Remove the named replica sets, their member processes and any process whose
    /// `replSetName` points at one of them.
    fn remove_replica_sets(&mut self, names: &[String]) -> Result<Vec<String>> {
        let is_target = |n: &str| names.iter().any(|x| x == n);

        let mut processes: Vec<String> = Vec::new();
        let mut keep = Vec::new();
        for replica_set in self.replica_sets()? {
            let target = is_target(replica_set.name()?);
            if target {
                processes.extend(replica_set.member_hosts()?.into_iter().map(str::to_string));
            }
            keep.push(!target);
        }
        self.retain_entries(REPLICA_SETS_KEY, keep)?;

        for process in self.processes()? {
            if process.replica_set_name()?.is_some_and(is_target) {
                processes.push(process.name()?.to_string());
            }
        }
        self.remove_processes(&processes)
    }

    /// Remove processes by name, drop them from every replica set member list and remove
    /// the agent entries of their hosts. Returns the names actually removed, sorted.
    ///
    /// Agents are keyed by hostname only: a host shared with a surviving process loses its
    /// agents as well.
    fn remove_processes(&mut self, names: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        let mut hostnames = Vec::new();
        let mut keep = Vec::new();
        for process in self.processes()? {
            let name = process.name()?;
            let target = names.iter().any(|n| n == name);
            if target {
                removed.push(name.to_string());
                hostnames.push(process.hostname()?.to_string());
            }
            keep.push(!target);
        }
        if removed.is_empty() {
            return Ok(removed);
        }
        self.retain_entries(PROCESSES_KEY, keep)?;

        for i in 0..self.entries(REPLICA_SETS_KEY)?.len() {
            let mut replica_set = ReplicaSetViewMut::view_mut(self.entry_mut(REPLICA_SETS_KEY, i)?);
            let dropped = replica_set.remove_members(&removed)?;
            if !dropped.is_empty() {
                debug!(replica_set = %replica_set.name()?, members = ?dropped, "Dropped members of removed processes");
            }
        }

        self.remove_agents(&hostnames)?;
        removed.sort();
        removed.dedup();
        Ok(removed)
    }

    // ========================================================================
    // Shard decommissioning
    // ========================================================================

    /// Replica sets named like shards of `cluster` (`<cluster>-<n>`) that the cluster no
    /// longer references.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ShardedClusterNotFound`] if absent.
    pub fn replica_sets_removed_from_cluster(&self, cluster: &str) -> Result<Vec<String>> {
        let Some(entry) = self.find_sharded_cluster(cluster)? else {
            return Err(DeploymentError::ShardedClusterNotFound {
                name: cluster.to_string(),
            });
        };
        let referenced = entry.all_replica_sets()?;
        let mut orphans = Vec::new();
        for replica_set in self.replica_sets()? {
            let name = replica_set.name()?;
            if !referenced.contains(&name) && is_shard_of(cluster, name) {
                orphans.push(name.to_string());
            }
        }
        Ok(orphans)
    }

    /// First phase of shard removal: list the orphaned shard replica sets in the
    /// cluster's `draining` array so the agents rebalance their data. Returns them.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ShardedClusterNotFound`] if absent.
    pub fn mark_shards_draining(&mut self, cluster: &str) -> Result<Vec<String>> {
        self.stage(|d| {
            let orphans = d.replica_sets_removed_from_cluster(cluster)?;
            if orphans.is_empty() {
                return Ok(orphans);
            }
            if let Some(mut entry) = d.sharded_cluster_mut(cluster)? {
                entry.add_to_draining(&orphans)?;
            }
            info!(cluster = %cluster, shards = ?orphans, "Shards scheduled for removal");
            Ok(orphans)
        })
    }

    /// Second phase of shard removal, once data has been rebalanced: remove the orphaned
    /// shard replica sets with their processes and clear `draining`. Returns the removed
    /// process names.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ShardedClusterNotFound`] if absent.
    pub fn finalize_shard_removal(&mut self, cluster: &str) -> Result<Vec<String>> {
        let result = self.stage(|d| {
            let orphans = d.replica_sets_removed_from_cluster(cluster)?;
            if let Some(mut entry) = d.sharded_cluster_mut(cluster)? {
                entry.remove_draining();
            }
            if orphans.is_empty() {
                return Ok(Vec::new());
            }
            let removed = d.remove_replica_sets(&orphans)?;
            info!(cluster = %cluster, replica_sets = ?orphans, processes = ?removed, "Removed drained shards");
            Ok(removed)
        });
        if let Ok(removed) = &result {
            metrics::record_removed("process", removed.len());
        }
        result
    }

    // ========================================================================
    // Agents
    // ========================================================================

    /// Register a monitoring agent on `hostname` (one per resource) and a backup agent on
    /// every process host. Existing entries are kept; nothing happens without processes.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn add_monitoring_and_backup(&mut self, hostname: &str) -> Result<()> {
        self.stage(|d| {
            let hosts: Vec<String> = d
                .processes()?
                .iter()
                .map(|p| p.hostname().map(str::to_string))
                .collect::<Result<_>>()?;
            if hosts.is_empty() {
                return Ok(());
            }
            if d.add_agent(MONITORING_VERSIONS_KEY, hostname, MONITORING_AGENT_DEFAULT_VERSION)? {
                debug!(host = %hostname, "Added monitoring agent configuration");
            }
            for host in &hosts {
                if d.add_agent(BACKUP_VERSIONS_KEY, host, BACKUP_AGENT_DEFAULT_VERSION)? {
                    debug!(host = %host, "Added backup agent configuration");
                }
            }
            Ok(())
        })
    }

    fn agent_hostnames(&self, key: &str) -> Result<Vec<Option<&str>>> {
        self.entries(key)?
            .into_iter()
            .enumerate()
            .map(|(i, agent)| get_str(agent, "hostname", &format!("{key}[{i}]")))
            .collect()
    }

    fn add_agent(&mut self, key: &str, hostname: &str, version: &str) -> Result<bool> {
        if self.agent_hostnames(key)?.contains(&Some(hostname)) {
            return Ok(false);
        }
        self.push_entry(key, json_object(json!({ "hostname": hostname, "name": version })))?;
        Ok(true)
    }

    fn remove_agents(&mut self, hostnames: &[String]) -> Result<()> {
        for key in [MONITORING_VERSIONS_KEY, BACKUP_VERSIONS_KEY] {
            let keep: Vec<bool> = self
                .agent_hostnames(key)?
                .into_iter()
                .map(|host| !host.is_some_and(|h| hostnames.iter().any(|x| x == h)))
                .collect();
            if keep.iter().all(|k| *k) {
                continue;
            }
            self.retain_entries(key, keep)?;
            debug!(agents = key, hosts = ?hostnames, "Removed agent configurations");
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Names of the processes that belong to a resource. A standalone is just `name`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn process_names(&self, kind: ResourceKind, name: &str) -> Result<Vec<String>> {
        match kind {
            ResourceKind::Standalone => Ok(vec![name.to_string()]),
            ResourceKind::ReplicaSet => self.replica_set_process_names(name),
            ResourceKind::ShardedCluster => {
                let Some(cluster) = self.find_sharded_cluster(name)? else {
                    return Ok(Vec::new());
                };
                let mut names = Vec::new();
                for replica_set in cluster.shard_replica_sets()? {
                    names.extend(self.replica_set_process_names(replica_set)?);
                }
                names.extend(self.replica_set_process_names(cluster.config_server_replica()?)?);
                names.extend(self.mongos_process_names(name)?);
                Ok(names)
            }
        }
    }

    fn replica_set_process_names(&self, name: &str) -> Result<Vec<String>> {
        match self.find_replica_set(name)? {
            Some(replica_set) => Ok(replica_set
                .member_hosts()?
                .into_iter()
                .map(str::to_string)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Names of every process, in document order.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn all_process_names(&self) -> Result<Vec<String>> {
        self.processes()?
            .iter()
            .map(|p| p.name().map(str::to_string))
            .collect()
    }

    /// Hostnames of every process, in document order.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn all_hostnames(&self) -> Result<Vec<String>> {
        self.processes()?
            .iter()
            .map(|p| p.hostname().map(str::to_string))
            .collect()
    }

    /// Number of processes.
    ///
    /// # Errors
    ///
    /// Structural error if `processes` is not an array of objects.
    pub fn number_of_processes(&self) -> Result<usize> {
        Ok(self.entries(PROCESSES_KEY)?.len())
    }

    /// Whether `process` belongs to the standalone, replica set or sharded cluster named
    /// `resource`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn process_belongs_to_resource(&self, process: &str, resource: &str) -> Result<bool> {
        for kind in [
            ResourceKind::ShardedCluster,
            ResourceKind::ReplicaSet,
            ResourceKind::Standalone,
        ] {
            if self.process_names(kind, resource)?.iter().any(|n| n == process) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// How many processes do not belong to `resource`. Orphaned shard replica sets of a
    /// cluster being scaled down count as belonging to it.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn number_of_excess_processes(&self, resource: &str) -> Result<usize> {
        let names = self.all_process_names()?;
        let mut excess = names.len();
        for name in &names {
            if self.process_belongs_to_resource(name, resource)? {
                excess -= 1;
            }
        }
        if self.find_sharded_cluster(resource)?.is_some() {
            for replica_set in self.replica_sets_removed_from_cluster(resource)? {
                excess = excess.saturating_sub(self.replica_set_process_names(&replica_set)?.len());
            }
        }
        Ok(excess)
    }

    /// Lowest major version across processes, using `featureCompatibilityVersion` where
    /// set. `None` without processes.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::InvalidVersion`] if a version cannot be parsed.
    pub fn minimum_major_version(&self) -> Result<Option<u64>> {
        let mut minimum: Option<semver::Version> = None;
        for process in self.processes()? {
            let version = match process.feature_compatibility_version()? {
                Some(fcv) => parse_version(fcv)?,
                None => parse_version(process.version()?)?,
            };
            if minimum.as_ref().is_none_or(|m| version < *m) {
                minimum = Some(version);
            }
        }
        Ok(minimum.map(|v| v.major))
    }

    /// Whether every process has TLS enabled.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn all_processes_tls_enabled(&self) -> Result<bool> {
        for process in self.processes()? {
            if !process.is_tls_enabled()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether any process has internal cluster authentication configured.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn any_process_has_internal_cluster_authentication(&self) -> Result<bool> {
        for process in self.processes()? {
            if process.has_internal_cluster_authentication()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ========================================================================
    // Process-level edits
    // ========================================================================

    /// Set `disabled` on the named processes.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ProcessNotFound`] for an unknown name; nothing is changed then.
    pub fn disable_processes(&mut self, names: &[String]) -> Result<()> {
        self.stage(|d| {
            for name in names {
                match d.process_mut(name)? {
                    Some(mut process) => {
                        process.set_disabled(true);
                    }
                    None => return Err(DeploymentError::ProcessNotFound { name: name.clone() }),
                }
            }
            Ok(())
        })
    }

    /// Take the vote (and priority) away from the given members of a replica set.
    ///
    /// # Errors
    ///
    /// [`DeploymentError::ReplicaSetNotFound`], or [`DeploymentError::MembersNotFound`]
    /// listing every unknown member; nothing is changed then.
    pub fn mark_rs_members_unvoted(&mut self, replica_set: &str, members: &[String]) -> Result<()> {
        self.stage(|d| {
            let Some(mut rs) = d.replica_set_mut(replica_set)? else {
                return Err(DeploymentError::ReplicaSetNotFound {
                    name: replica_set.to_string(),
                });
            };
            let mut missing = Vec::new();
            let mut entries = rs.members_mut()?;
            for name in members {
                let mut found = false;
                for member in &mut entries {
                    if member.host()? == name {
                        member.set_votes(0).set_priority(0.0);
                        found = true;
                    }
                }
                if !found {
                    missing.push(name.clone());
                }
            }
            if missing.is_empty() {
                Ok(())
            } else {
                Err(DeploymentError::MembersNotFound {
                    replica_set: replica_set.to_string(),
                    members: missing,
                })
            }
        })
    }

    /// Configure internal cluster authentication on the named processes. Unknown names
    /// are skipped; only `x509` has an effect.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn configure_internal_cluster_authentication(&mut self, names: &[String], mode: &str) -> Result<()> {
        let mode = mode.to_ascii_lowercase();
        self.stage(|d| {
            for name in names {
                if let Some(mut process) = d.process_mut(name)? {
                    process.configure_cluster_auth_mode(&mode)?;
                }
            }
            Ok(())
        })
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check the whole document: unique process, replica set, cluster and shard names,
    /// unique members per replica set, members resolving to processes and cluster
    /// references resolving to replica sets.
    ///
    /// # Errors
    ///
    /// The first violation found.
    pub fn validate(&self) -> Result<()> {
        let processes = self.processes()?;
        let mut process_names = HashSet::new();
        for process in &processes {
            let name = process.name()?;
            if !process_names.insert(name) {
                return Err(DeploymentError::DuplicateIdentity {
                    kind: "process",
                    name: name.to_string(),
                });
            }
        }

        let replica_sets = self.replica_sets()?;
        let mut replica_set_names = HashSet::new();
        for replica_set in &replica_sets {
            let name = replica_set.name()?;
            if !replica_set_names.insert(name) {
                return Err(DeploymentError::DuplicateIdentity {
                    kind: "replica set",
                    name: name.to_string(),
                });
            }
            validate_replica_set(replica_set, &process_names)?;
        }

        let clusters = self.sharded_clusters()?;
        let mut cluster_names = HashSet::new();
        for cluster in &clusters {
            let name = cluster.name()?;
            if !cluster_names.insert(name) {
                return Err(DeploymentError::DuplicateIdentity {
                    kind: "sharded cluster",
                    name: name.to_string(),
                });
            }
            validate_sharded_cluster(cluster, &replica_set_names)?;
        }
        Ok(())
    }

    fn check_replica_set(&self, name: &str) -> Result<()> {
        let processes = self.processes()?;
        let process_names = processes.iter().map(Process::name).collect::<Result<HashSet<_>>>()?;
        match self.find_replica_set(name)? {
            Some(replica_set) => validate_replica_set(&replica_set, &process_names),
            None => Err(DeploymentError::ReplicaSetNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn check_sharded_cluster(&self, name: &str) -> Result<()> {
        let replica_sets = self.replica_sets()?;
        let replica_set_names = replica_sets
            .iter()
            .map(ReplicaSet::name)
            .collect::<Result<HashSet<_>>>()?;
        match self.find_sharded_cluster(name)? {
            Some(cluster) => validate_sharded_cluster(&cluster, &replica_set_names),
            None => Err(DeploymentError::ShardedClusterNotFound {
                name: name.to_string(),
            }),
        }
    }
}

fn validate_replica_set(replica_set: &ReplicaSetView<'_>, processes: &HashSet<&str>) -> Result<()> {
    let name = replica_set.name()?;
    let mut seen = HashSet::new();
    for host in replica_set.member_hosts()? {
        if !seen.insert(host) {
            return Err(DeploymentError::DuplicateIdentity {
                kind: "replica set member",
                name: format!("{name}/{host}"),
            });
        }
        if !processes.contains(host) {
            return Err(DeploymentError::DanglingReference {
                owner: format!("replica set '{name}'"),
                kind: "process",
                name: host.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_sharded_cluster(cluster: &ShardedClusterView<'_>, replica_sets: &HashSet<&str>) -> Result<()> {
    let name = cluster.name()?;
    let owner = || format!("sharded cluster '{name}'");
    let config_server = cluster.config_server_replica()?;
    if !replica_sets.contains(config_server) {
        return Err(DeploymentError::DanglingReference {
            owner: owner(),
            kind: "replica set",
            name: config_server.to_string(),
        });
    }
    let shards = cluster.shards()?;
    let mut ids = HashSet::new();
    for shard in &shards {
        let id = shard.id()?;
        if !ids.insert(id) {
            return Err(DeploymentError::DuplicateIdentity {
                kind: "shard",
                name: format!("{name}/{id}"),
            });
        }
        let rs = shard.rs()?;
        if !replica_sets.contains(rs) {
            return Err(DeploymentError::DanglingReference {
                owner: owner(),
                kind: "replica set",
                name: rs.to_string(),
            });
        }
    }
    Ok(())
}

/// `<cluster>-<digits>` is the naming scheme of shard replica sets.
fn is_shard_of(cluster: &str, replica_set: &str) -> bool {
    replica_set
        .strip_prefix(cluster)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

fn get_array_mut<'a>(obj: &'a mut Object, key: &str) -> Result<Option<&'a mut Vec<Value>>> {
    match obj.get_mut(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(structure_error(key.to_string(), "array", other)),
    }
}

fn json_object(value: Value) -> Object {
    match value {
        Value::Object(obj) => obj,
        _ => Object::new(),
    }
}

/// Record the outcome of a public operation and log failures.
fn observe<T>(operation: &'static str, started: Instant, result: Result<T>) -> Result<T> {
    metrics::record_operation(operation, started.elapsed(), result.as_ref().err());
    if let Err(err) = &result {
        warn!(
            operation,
            error = %err,
            structural = err.is_structural(),
            "Deployment operation failed, document left unchanged"
        );
    }
    result
}
