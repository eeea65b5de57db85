// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Sharded cluster entries of the automation config (`sharding[]`).
//!
//! ```json
//! {
//!   "name": "shop",
//!   "configServerReplica": "shop-config",
//!   "shards": [
//!     { "_id": "shop-0", "rs": "shop-0" },
//!     { "_id": "shop-1", "rs": "shop-1" }
//!   ],
//!   "managedSharding": false,
//!   "collections": [],
//!   "tags": []
//! }
//! ```
//!
//! Only `name`, `configServerReplica` and `shards` belong to the operator. The `draining`
//! list is maintained through the shard decommissioning helpers on
//! [`crate::deployment::Deployment`].

use std::borrow::{Borrow, BorrowMut};
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use super::process::{AdditionalConfig, Process};
use super::replica_set::ReplicaSetWithProcesses;
use super::value::{element_object, get_array, read_or_create_array, require_str, Object};
use crate::errors::{DeploymentError, Result};

/// Read-only lens into a deployment's sharded cluster.
pub type ShardedClusterView<'a> = ShardedCluster<&'a Object>;

/// Mutable lens into a deployment's sharded cluster.
pub type ShardedClusterViewMut<'a> = ShardedCluster<&'a mut Object>;

/// Lens over one `shards[]` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard<O = Object>(O);

impl Shard {
    /// A shard backed by the replica set `rs`, using the replica set name as shard id.
    #[must_use]
    pub fn new(rs: &str) -> Self {
        let mut obj = Object::new();
        obj.insert("_id".into(), json!(rs));
        obj.insert("rs".into(), json!(rs));
        Self(obj)
    }

    /// Unwrap into the underlying JSON object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

impl<O: Borrow<Object>> Shard<O> {
    /// The underlying JSON object.
    pub fn object(&self) -> &Object {
        self.0.borrow()
    }

    /// Shard id (identity key).
    ///
    /// # Errors
    ///
    /// Structural error if `_id` is absent or not a string.
    pub fn id(&self) -> Result<&str> {
        require_str(self.object(), "_id", "shard")
    }

    /// Name of the backing replica set.
    ///
    /// # Errors
    ///
    /// Structural error if `rs` is absent or not a string.
    pub fn rs(&self) -> Result<&str> {
        let ctx = match self.object().get("_id") {
            Some(Value::String(id)) => format!("shard '{id}'"),
            _ => "shard".to_string(),
        };
        require_str(self.object(), "rs", &ctx)
    }
}

/// Lens over one `sharding[]` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardedCluster<O = Object>(O);

impl ShardedCluster {
    /// A new cluster entry referencing the config server replica set and the shard
    /// replica sets, plus the empty collections Ops Manager expects.
    #[must_use]
    pub fn new(name: &str, config_server_replica: &str, shard_replica_sets: &[&str]) -> Self {
        let shards = shard_replica_sets
            .iter()
            .map(|rs| Value::Object(Shard::new(rs).into_object()))
            .collect();
        let mut obj = Object::new();
        obj.insert("name".into(), json!(name));
        obj.insert("configServerReplica".into(), json!(config_server_replica));
        obj.insert("shards".into(), Value::Array(shards));
        obj.insert("collections".into(), Value::Array(Vec::new()));
        obj.insert("managedSharding".into(), json!(false));
        obj.insert("tags".into(), Value::Array(Vec::new()));
        Self(obj)
    }

    /// Unwrap into the underlying JSON object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

impl<'a> ShardedClusterView<'a> {
    pub(crate) fn view(obj: &'a Object) -> Self {
        Self(obj)
    }
}

impl<'a> ShardedClusterViewMut<'a> {
    pub(crate) fn view_mut(obj: &'a mut Object) -> Self {
        Self(obj)
    }
}

impl<O: Borrow<Object>> ShardedCluster<O> {
    /// The underlying JSON object.
    pub fn object(&self) -> &Object {
        self.0.borrow()
    }

    /// Cluster name (identity key).
    ///
    /// # Errors
    ///
    /// Structural error if `name` is absent or not a string.
    pub fn name(&self) -> Result<&str> {
        require_str(self.object(), "name", "sharded cluster")
    }

    /// Name of the config server replica set.
    ///
    /// # Errors
    ///
    /// Structural error if `configServerReplica` is absent or not a string.
    pub fn config_server_replica(&self) -> Result<&str> {
        require_str(self.object(), "configServerReplica", &self.ctx())
    }

    /// Shard lenses in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `shards` is not an array of objects.
    pub fn shards(&self) -> Result<Vec<Shard<&Object>>> {
        let ctx = format!("{}.shards", self.ctx());
        let Some(items) = get_array(self.object(), "shards", &self.ctx())? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| element_object(v, &ctx, i).map(Shard))
            .collect()
    }

    /// Replica sets referenced by the shards.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn shard_replica_sets(&self) -> Result<Vec<&str>> {
        let ctx = format!("{}.shards", self.ctx());
        let Some(items) = get_array(self.object(), "shards", &self.ctx())? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| require_str(element_object(v, &ctx, i)?, "rs", &format!("{ctx}[{i}]")))
            .collect()
    }

    /// The config server replica set followed by every shard replica set.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn all_replica_sets(&self) -> Result<Vec<&str>> {
        let mut names = vec![self.config_server_replica()?];
        names.extend(self.shard_replica_sets()?);
        Ok(names)
    }

    /// Replica sets scheduled for removal (`draining`).
    ///
    /// # Errors
    ///
    /// Structural error if `draining` is not an array of strings.
    pub fn draining(&self) -> Result<Vec<&str>> {
        let ctx = format!("{}.draining", self.ctx());
        let Some(items) = get_array(self.object(), "draining", &self.ctx())? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str().ok_or_else(|| {
                    super::value::structure_error(format!("{ctx}[{i}]"), "string", v)
                })
            })
            .collect()
    }

    fn ctx(&self) -> String {
        match self.object().get("name") {
            Some(Value::String(name)) => format!("sharded cluster '{name}'"),
            _ => "sharded cluster".to_string(),
        }
    }
}

impl<O: BorrowMut<Object>> ShardedCluster<O> {
    fn object_mut(&mut self) -> &mut Object {
        self.0.borrow_mut()
    }

    /// Merge the desired cluster entry into this one.
    ///
    /// `name` and `configServerReplica` are taken from `desired`. Shards are matched by
    /// `_id`: known shards keep their Ops Manager object with `_id` and `rs` overlaid, new
    /// shards are added, and shards `desired` no longer lists are dropped. Returns the ids
    /// of the dropped shards, sorted. The shard list ends up ordered by `_id`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch, [`DeploymentError::DuplicateIdentity`] if either
    /// side lists a shard id twice.
    pub fn merge_from<D: Borrow<Object>>(&mut self, desired: &ShardedCluster<D>) -> Result<Vec<String>> {
        let name = desired.name()?.to_string();
        let config_server = desired.config_server_replica()?.to_string();

        let mut current: BTreeMap<String, Object> = BTreeMap::new();
        for shard in self.shards()? {
            let id = shard.id()?.to_string();
            if current.insert(id.clone(), shard.object().clone()).is_some() {
                return Err(duplicate_shard(&name, &id));
            }
        }

        let mut merged: BTreeMap<String, Object> = BTreeMap::new();
        for shard in desired.shards()? {
            let id = shard.id()?.to_string();
            let mut entry = current.remove(&id).unwrap_or_default();
            entry.insert("_id".into(), json!(id));
            entry.insert("rs".into(), json!(shard.rs()?));
            if merged.insert(id.clone(), entry).is_some() {
                return Err(duplicate_shard(&name, &id));
            }
        }

        let removed: Vec<String> = current.into_keys().collect();
        let shards = merged.into_values().map(Value::Object).collect();

        let obj = self.object_mut();
        obj.insert("name".into(), json!(name));
        obj.insert("configServerReplica".into(), json!(config_server));
        obj.insert("shards".into(), Value::Array(shards));
        Ok(removed)
    }

    /// Add replica sets to `draining`, skipping those already listed.
    ///
    /// # Errors
    ///
    /// Structural error if `draining` is not an array of strings.
    pub fn add_to_draining(&mut self, replica_sets: &[String]) -> Result<()> {
        self.draining()?;
        let ctx = self.ctx();
        let draining = read_or_create_array(self.object_mut(), "draining", &ctx)?;
        for rs in replica_sets {
            if !draining.iter().any(|v| v.as_str() == Some(rs.as_str())) {
                draining.push(json!(rs));
            }
        }
        Ok(())
    }

    /// Drop the `draining` list.
    pub fn remove_draining(&mut self) {
        self.object_mut().remove("draining");
    }
}

impl Serialize for ShardedCluster {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<O: Borrow<Object>> fmt::Display for ShardedCluster<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or("<unset>");
        let shards = self.shard_replica_sets().unwrap_or_default();
        write!(f, "\"{name}\" (shards: {shards:?})")
    }
}

fn duplicate_shard(cluster: &str, id: &str) -> DeploymentError {
    DeploymentError::DuplicateIdentity {
        kind: "shard",
        name: format!("{cluster}/{id}"),
    }
}

/// Desired state of a whole sharded cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardedClusterSpec {
    /// Cluster name
    pub name: String,
    /// Router processes; each must have `processType = mongos`
    pub mongos: Vec<Process>,
    /// Extra `args2_6` settings for the routers
    pub mongos_config: AdditionalConfig,
    /// The config server replica set
    pub config_server: ReplicaSetWithProcesses,
    /// One replica set per shard
    pub shards: Vec<ReplicaSetWithProcesses>,
}

impl ShardedClusterSpec {
    /// The cluster entry this spec describes.
    ///
    /// # Errors
    ///
    /// Structural error if a replica set has no name.
    pub fn to_cluster(&self) -> Result<ShardedCluster> {
        let shard_names = self
            .shards
            .iter()
            .map(ReplicaSetWithProcesses::name)
            .collect::<Result<Vec<_>>>()?;
        Ok(ShardedCluster::new(
            &self.name,
            self.config_server.name()?,
            &shard_names,
        ))
    }
}

/// What a sharded cluster merge dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardedClusterMerge {
    /// Shard ids no longer part of the cluster. Their replica sets still exist.
    pub removed_shards: Vec<String>,
    /// Processes removed from the deployment (mongos scale-down, replica set members)
    pub removed_processes: Vec<String>,
}

#[cfg(test)]
#[path = "sharded_cluster_tests.rs"]
mod sharded_cluster_tests;
