// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common fixtures for integration tests

#![allow(dead_code)]

use om_deployment::deployment::{
    AdditionalConfig, Deployment, MemberOptions, Object, Process, ReplicaSetWithProcesses,
    ShardedClusterSpec,
};
use serde_json::Value;

pub const VERSION: &str = "6.0.5";

pub fn mongod(name: &str) -> Process {
    Process::new_mongod(name, &format!("{name}.svc"), VERSION, None).unwrap()
}

pub fn mongos(name: &str) -> Process {
    Process::new_mongos(name, &format!("{name}.svc"), VERSION, None).unwrap()
}

/// A replica set over processes with the given names.
pub fn replica_set_of(name: &str, members: &[&str]) -> ReplicaSetWithProcesses {
    let processes = members.iter().map(|m| mongod(m)).collect();
    ReplicaSetWithProcesses::new(name, processes, &[]).unwrap()
}

/// A replica set of `members` processes named `<name>-<i>`.
pub fn replica_set(name: &str, members: usize) -> ReplicaSetWithProcesses {
    let names: Vec<String> = (0..members).map(|i| format!("{name}-{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    replica_set_of(name, &refs)
}

pub fn replica_set_with_options(name: &str, options: &[MemberOptions]) -> ReplicaSetWithProcesses {
    let processes = (0..options.len()).map(|i| mongod(&format!("{name}-{i}"))).collect();
    ReplicaSetWithProcesses::new(name, processes, options).unwrap()
}

/// A sharded cluster following the operator naming scheme, with three-member replica sets.
pub fn sharded_cluster(name: &str, shards: usize, routers: usize) -> ShardedClusterSpec {
    ShardedClusterSpec {
        name: name.to_string(),
        mongos: (0..routers).map(|i| mongos(&format!("{name}-mongos-{i}"))).collect(),
        mongos_config: AdditionalConfig::default(),
        config_server: replica_set(&format!("{name}-config"), 3),
        shards: (0..shards).map(|i| replica_set(&format!("{name}-{i}"), 3)).collect(),
    }
}

/// Apply `f` to the raw document, the way an Ops Manager user editing it would.
pub fn edit(deployment: Deployment, f: impl FnOnce(&mut Object)) -> Deployment {
    let mut obj = deployment.into_object();
    f(&mut obj);
    Deployment::from_object(obj).unwrap()
}

/// The JSON object of the entry of `key` whose `id_key` is `name`.
pub fn entry<'a>(deployment: &'a Deployment, key: &str, id_key: &str, name: &str) -> &'a Value {
    deployment.object()[key]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e[id_key] == name)
        .unwrap_or_else(|| panic!("no {key} entry named {name}"))
}

pub fn entry_mut<'a>(obj: &'a mut Object, key: &str, id_key: &str, name: &str) -> &'a mut Object {
    obj.get_mut(key)
        .and_then(Value::as_array_mut)
        .unwrap()
        .iter_mut()
        .find(|e| e[id_key] == name)
        .and_then(Value::as_object_mut)
        .unwrap_or_else(|| panic!("no {key} entry named {name}"))
}

pub fn member_ids(deployment: &Deployment, replica_set: &str) -> Vec<i64> {
    deployment
        .find_replica_set(replica_set)
        .unwrap()
        .unwrap()
        .members()
        .unwrap()
        .iter()
        .map(|m| m.id().unwrap())
        .collect()
}
