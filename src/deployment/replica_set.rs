// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Replica set entries of the automation config (`replicaSets[]`).
//!
//! ```json
//! {
//!   "_id": "blue",
//!   "protocolVersion": "1",
//!   "members": [
//!     { "_id": 0, "host": "blue-0" },
//!     { "_id": 1, "host": "blue-1" },
//!     { "_id": 2, "host": "blue-2", "arbiterOnly": true, "priority": 0 }
//!   ]
//! }
//! ```
//!
//! Members reference processes by name through `host`. Member `_id`s are stable: once Ops
//! Manager knows a member under an id, merges keep it.

use std::borrow::{Borrow, BorrowMut};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::process::{AdditionalConfig, Process};
use super::value::{
    element_object, element_object_mut, get_array, get_f64, get_integer, get_str,
    read_or_create_array, require_integer, require_str, Object,
};
use super::version::protocol_version;
use crate::constants::MAX_VOTING_MEMBERS;
use crate::errors::{DeploymentError, Result};

/// Read-only lens into a deployment's replica set.
pub type ReplicaSetView<'a> = ReplicaSet<&'a Object>;

/// Mutable lens into a deployment's replica set.
pub type ReplicaSetViewMut<'a> = ReplicaSet<&'a mut Object>;

/// Per-member settings supplied by the desired topology.
///
/// Unset fields are not written, so values chosen in Ops Manager survive merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberOptions {
    /// Number of votes (0 or 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<i64>,
    /// Election priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// Replica set tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    /// Split-horizon DNS names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizons: Option<BTreeMap<String, String>>,
}

/// Lens over one `members[]` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSetMember<O = Object>(O);

impl ReplicaSetMember {
    /// A new member with only `_id` and `host`, plus whatever `options` sets.
    #[must_use]
    pub fn new(id: i64, host: &str, options: &MemberOptions) -> Self {
        let mut obj = Object::new();
        obj.insert("_id".into(), json!(id));
        obj.insert("host".into(), json!(host));
        let mut member = Self(obj);
        member.apply_options(options);
        member
    }

    pub(crate) fn from_object(obj: Object) -> Self {
        Self(obj)
    }

    /// Unwrap into the underlying JSON object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

impl<O: Borrow<Object>> ReplicaSetMember<O> {
    /// The underlying JSON object.
    pub fn object(&self) -> &Object {
        self.0.borrow()
    }

    /// Name of the process this member refers to (identity key).
    ///
    /// # Errors
    ///
    /// Structural error if `host` is absent or not a string.
    pub fn host(&self) -> Result<&str> {
        require_str(self.object(), "host", "replica set member")
    }

    /// Member id. Ops Manager has been seen to send integral floats; both are accepted.
    ///
    /// # Errors
    ///
    /// Structural error if `_id` is absent or not an integer.
    pub fn id(&self) -> Result<i64> {
        require_integer(self.object(), "_id", &self.ctx())
    }

    /// Number of votes; MongoDB's default of 1 applies when unset.
    ///
    /// # Errors
    ///
    /// Structural error if `votes` is not an integer.
    pub fn votes(&self) -> Result<i64> {
        Ok(get_integer(self.object(), "votes", &self.ctx())?.unwrap_or(1))
    }

    /// Election priority, if set.
    ///
    /// # Errors
    ///
    /// Structural error if `priority` is not a number.
    pub fn priority(&self) -> Result<Option<f64>> {
        get_f64(self.object(), "priority", &self.ctx())
    }

    /// Whether the member is an arbiter.
    ///
    /// # Errors
    ///
    /// Structural error if `arbiterOnly` is not a boolean.
    pub fn is_arbiter(&self) -> Result<bool> {
        Ok(super::value::get_bool(self.object(), "arbiterOnly", &self.ctx())?.unwrap_or(false))
    }

    fn ctx(&self) -> String {
        match self.object().get("host") {
            Some(Value::String(host)) => format!("replica set member '{host}'"),
            _ => "replica set member".to_string(),
        }
    }
}

impl<O: BorrowMut<Object>> ReplicaSetMember<O> {
    fn object_mut(&mut self) -> &mut Object {
        self.0.borrow_mut()
    }

    pub(crate) fn set_id(&mut self, id: i64) -> &mut Self {
        self.object_mut().insert("_id".into(), json!(id));
        self
    }

    /// Set `votes`. Setting 0 votes without priority 0 is not a valid config.
    pub fn set_votes(&mut self, votes: i64) -> &mut Self {
        self.object_mut().insert("votes".into(), json!(votes));
        self
    }

    /// Set `priority`.
    pub fn set_priority(&mut self, priority: f64) -> &mut Self {
        self.object_mut().insert("priority".into(), json!(priority));
        self
    }

    /// Write every option that is set.
    pub fn apply_options(&mut self, options: &MemberOptions) -> &mut Self {
        if let Some(votes) = options.votes {
            self.set_votes(votes);
        }
        if let Some(priority) = options.priority {
            self.set_priority(priority);
        }
        if let Some(tags) = &options.tags {
            self.object_mut().insert("tags".into(), json!(tags));
        }
        if let Some(horizons) = &options.horizons {
            if !horizons.is_empty() {
                self.object_mut().insert("horizons".into(), json!(horizons));
            }
        }
        self
    }

    /// Overlay the desired member onto this one. `_id` always stays as is; `host` and the
    /// optional settings are taken from `desired` when it carries them.
    fn overlay_from<D: Borrow<Object>>(&mut self, desired: &ReplicaSetMember<D>) {
        let source = desired.object();
        let target = self.object_mut();
        for key in ["host", "votes", "priority", "tags", "horizons"] {
            if let Some(value) = source.get(key) {
                target.insert(key.into(), value.clone());
            }
        }
    }
}

impl Serialize for ReplicaSetMember {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Lens over one `replicaSets[]` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSet<O = Object>(O);

impl ReplicaSet {
    /// An empty replica set. `protocolVersion` is only seeded for versions that have it.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::InvalidVersion`] if `version` cannot be parsed.
    pub fn new(name: &str, version: Option<&str>) -> Result<Self> {
        let mut obj = Object::new();
        obj.insert("_id".into(), json!(name));
        obj.insert("members".into(), Value::Array(Vec::new()));
        if let Some(pv) = version.map(protocol_version).transpose()?.flatten() {
            obj.insert("protocolVersion".into(), json!(pv));
        }
        Ok(Self(obj))
    }

    /// Wrap an existing object.
    #[must_use]
    pub fn from_object(obj: Object) -> Self {
        Self(obj)
    }

    /// Unwrap into the underlying JSON object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

impl<'a> ReplicaSetView<'a> {
    pub(crate) fn view(obj: &'a Object) -> Self {
        Self(obj)
    }
}

impl<'a> ReplicaSetViewMut<'a> {
    pub(crate) fn view_mut(obj: &'a mut Object) -> Self {
        Self(obj)
    }
}

impl<O: Borrow<Object>> ReplicaSet<O> {
    /// The underlying JSON object.
    pub fn object(&self) -> &Object {
        self.0.borrow()
    }

    /// Replica set name (identity key `_id`).
    ///
    /// # Errors
    ///
    /// Structural error if `_id` is absent or not a string.
    pub fn name(&self) -> Result<&str> {
        require_str(self.object(), "_id", "replica set")
    }

    /// `protocolVersion`, if present.
    pub fn protocol_version(&self) -> Option<&Value> {
        self.object().get("protocolVersion")
    }

    /// Member lenses in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `members` is not an array of objects.
    pub fn members(&self) -> Result<Vec<ReplicaSetMember<&Object>>> {
        let ctx = self.members_ctx();
        let Some(items) = get_array(self.object(), "members", &self.ctx())? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| element_object(v, &ctx, i).map(ReplicaSetMember))
            .collect()
    }

    /// Names of the processes referenced by the members.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn member_hosts(&self) -> Result<Vec<&str>> {
        let ctx = self.members_ctx();
        let Some(items) = get_array(self.object(), "members", &self.ctx())? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| require_str(element_object(v, &ctx, i)?, "host", &format!("{ctx}[{i}]")))
            .collect()
    }

    /// Find a member by process name.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn find_member(&self, host: &str) -> Result<Option<ReplicaSetMember<&Object>>> {
        for member in self.members()? {
            if member.host()? == host {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    fn ctx(&self) -> String {
        match self.object().get("_id") {
            Some(Value::String(name)) => format!("replica set '{name}'"),
            _ => "replica set".to_string(),
        }
    }

    fn members_ctx(&self) -> String {
        format!("{}.members", self.ctx())
    }
}

impl<O: BorrowMut<Object>> ReplicaSet<O> {
    fn object_mut(&mut self) -> &mut Object {
        self.0.borrow_mut()
    }

    fn members_array_mut(&mut self) -> Result<&mut Vec<Value>> {
        let ctx = self.ctx();
        read_or_create_array(self.object_mut(), "members", &ctx)
    }

    /// Mutable member lenses in document order.
    ///
    /// # Errors
    ///
    /// Structural error if `members` is not an array of objects.
    pub fn members_mut(&mut self) -> Result<Vec<ReplicaSetMember<&mut Object>>> {
        let ctx = self.members_ctx();
        self.members_array_mut()?
            .iter_mut()
            .enumerate()
            .map(|(i, v)| element_object_mut(v, &ctx, i).map(ReplicaSetMember))
            .collect()
    }

    fn set_name(&mut self, name: &str) -> &mut Self {
        self.object_mut().insert("_id".into(), json!(name));
        self
    }

    fn set_members(&mut self, members: Vec<ReplicaSetMember>) {
        let values = members
            .into_iter()
            .map(|m| Value::Object(m.into_object()))
            .collect();
        self.object_mut().insert("members".into(), Value::Array(values));
    }

    /// Append a member for `process`. Its `_id` is one past the last member's.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn add_member<P: Borrow<Object>>(
        &mut self,
        process: &Process<P>,
        options: &MemberOptions,
    ) -> Result<()> {
        let next_id = match self.members()?.last() {
            Some(last) => last.id()? + 1,
            None => 0,
        };
        let member = ReplicaSetMember::new(next_id, process.name()?, options);
        self.members_array_mut()?
            .push(Value::Object(member.into_object()));
        Ok(())
    }

    /// Merge the desired replica set into this (Ops Manager) one.
    ///
    /// Members present on both sides keep their Ops Manager object (and `_id`) with the
    /// desired settings overlaid. New members get ids after the highest surviving id.
    /// Members only Ops Manager knows about are dropped and their hosts returned, sorted.
    /// The result is ordered by `_id`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch, [`DeploymentError::DuplicateIdentity`] if either
    /// side lists the same host twice.
    pub fn merge_from<D: Borrow<Object>>(&mut self, desired: &ReplicaSet<D>) -> Result<Vec<String>> {
        let name = desired.name()?.to_string();
        self.set_name(&name);
        if let Some(pv) = desired.protocol_version() {
            let pv = pv.clone();
            self.object_mut().insert("protocolVersion".into(), pv);
        }

        let desired_members = desired.members()?;
        let mut desired_hosts = HashSet::new();
        for member in &desired_members {
            if !desired_hosts.insert(member.host()?) {
                return Err(duplicate_member(&name, member.host()?));
            }
        }

        let mut current: HashMap<String, ReplicaSetMember> = HashMap::new();
        for member in self.members()? {
            let host = member.host()?.to_string();
            if current.contains_key(&host) {
                return Err(duplicate_member(&name, &host));
            }
            current.insert(host, ReplicaSetMember(member.object().clone()));
        }

        let mut next_id = 0;
        for (host, member) in &current {
            if desired_hosts.contains(host.as_str()) {
                next_id = next_id.max(member.id()? + 1);
            }
        }

        let mut merged = Vec::with_capacity(desired_members.len());
        for member in &desired_members {
            let entry = match current.remove(member.host()?) {
                Some(mut existing) => {
                    existing.overlay_from(member);
                    existing
                }
                None => {
                    let mut added = ReplicaSetMember(member.object().clone());
                    added.set_id(next_id);
                    next_id += 1;
                    added
                }
            };
            merged.push((entry.id()?, entry));
        }
        merged.sort_by_key(|(id, _)| *id);

        let mut removed: Vec<String> = current.into_keys().collect();
        removed.sort();

        self.set_members(merged.into_iter().map(|(_, m)| m).collect());
        Ok(removed)
    }

    /// Drop every member whose host is in `hosts`. Returns the hosts actually dropped.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn remove_members(&mut self, hosts: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        let mut keep = Vec::new();
        for host in self.member_hosts()? {
            let drop = hosts.iter().any(|h| h == host);
            if drop {
                removed.push(host.to_string());
            }
            keep.push(!drop);
        }
        if !removed.is_empty() {
            let mut flags = keep.into_iter();
            self.members_array_mut()?
                .retain(|_| flags.next().unwrap_or(true));
        }
        Ok(removed)
    }

    /// Ensure no more than seven members vote: voters past the seventh get
    /// `votes = 0, priority = 0`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn limit_voting_members(&mut self) -> Result<()> {
        let mut voters = 0;
        for mut member in self.members_mut()? {
            if member.votes()? > 0 {
                voters += 1;
                if voters > MAX_VOTING_MEMBERS {
                    member.set_votes(0).set_priority(0.0);
                }
            }
        }
        Ok(())
    }
}

impl Serialize for ReplicaSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<O: Borrow<Object>> fmt::Display for ReplicaSet<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = get_str(self.object(), "_id", "").ok().flatten().unwrap_or("<unset>");
        let hosts = self.member_hosts().unwrap_or_default();
        write!(f, "\"{name}\" (members: {hosts:?})")
    }
}

fn duplicate_member(replica_set: &str, host: &str) -> DeploymentError {
    DeploymentError::DuplicateIdentity {
        kind: "replica set member",
        name: format!("{replica_set}/{host}"),
    }
}

/// A desired replica set together with the processes backing its members.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSetWithProcesses {
    /// The replica set entry
    pub replica_set: ReplicaSet,
    /// One process per member, in member order
    pub processes: Vec<Process>,
    /// Extra `args2_6` settings for every member
    pub additional_config: AdditionalConfig,
}

impl ReplicaSetWithProcesses {
    /// Build a replica set named `name` over `processes`.
    ///
    /// Every process gets `replication.replSetName = name`; members get ids `0..n` and the
    /// options at the same index (if any). `protocolVersion` follows the first process's
    /// version.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch, [`DeploymentError::InvalidVersion`] for an
    /// unparseable version.
    pub fn new(name: &str, mut processes: Vec<Process>, options: &[MemberOptions]) -> Result<Self> {
        let version = match processes.first() {
            Some(p) => Some(p.version()?.to_string()),
            None => None,
        };
        let mut replica_set = ReplicaSet::new(name, version.as_deref())?;
        let defaults = MemberOptions::default();
        for (i, process) in processes.iter_mut().enumerate() {
            process.set_replica_set_name(name)?;
            replica_set.add_member(&*process, options.get(i).unwrap_or(&defaults))?;
        }
        Ok(Self {
            replica_set,
            processes,
            additional_config: AdditionalConfig::default(),
        })
    }

    /// Merge `config.desired` into every process and keep `config` for the deployment merge.
    ///
    /// # Errors
    ///
    /// Structural error if a process's `args2_6` is not an object.
    pub fn with_additional_config(mut self, config: AdditionalConfig) -> Result<Self> {
        for process in &mut self.processes {
            process.merge_args(&config.desired)?;
        }
        self.additional_config = config;
        Ok(self)
    }

    /// Name of the replica set.
    ///
    /// # Errors
    ///
    /// Structural error if the replica set has no name.
    pub fn name(&self) -> Result<&str> {
        self.replica_set.name()
    }
}

#[cfg(test)]
#[path = "replica_set_tests.rs"]
mod replica_set_tests;
