// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired MongoDB topologies and their conversion into deployment entities.
//!
//! A topology is what a caller wants to run: a standalone, a replica set, or a sharded
//! cluster, with the MongoDB version and the hosts to run on. It is read from YAML or
//! JSON and turned into the [`Process`], [`ReplicaSetWithProcesses`] and
//! [`ShardedClusterSpec`] values the merge engine consumes.
//!
//! # Naming
//!
//! - replica set members: `<replica set>-<i>`
//! - shard replica sets: `<cluster>-<i>`
//! - the config server replica set: `<cluster>-config`
//! - mongos processes: `<cluster>-mongos-<i>`
//!
//! # Example
//!
//! ```rust,no_run
//! use om_deployment::deployment::Deployment;
//! use om_deployment::topology::Topology;
//!
//! let topology = Topology::from_yaml(r"
//! type: replicaSet
//! name: shop
//! version: 6.0.5
//! members:
//!   - hostname: shop-0.svc
//!   - hostname: shop-1.svc
//!   - hostname: shop-2.svc
//! ").unwrap();
//!
//! let mut deployment = Deployment::new();
//! topology.apply(&mut deployment).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{
    CA_FILE_PATH_IN_CONTAINER, CONFIG_SERVER_SUFFIX, MONGOS_INFIX, PEM_KEY_FILE_PATH_IN_CONTAINER,
};
use crate::deployment::{
    AdditionalConfig, Deployment, MemberOptions, Object, Process, ReplicaSetWithProcesses,
    ResourceKind, ShardedClusterSpec, TlsMode,
};
use crate::errors::Result;

/// A desired deployment of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Topology {
    /// A single mongod
    Standalone(StandaloneTopology),
    /// A replica set
    ReplicaSet(ReplicaSetTopology),
    /// A sharded cluster
    ShardedCluster(ShardedClusterTopology),
}

/// Settings shared by every process of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSettings {
    /// MongoDB version, e.g. `6.0.5` or `6.0.5-ent`
    pub version: String,
    /// Feature compatibility version; derived from `version` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_compatibility_version: Option<String>,
    /// TLS settings. When unset, merged processes lose their TLS settings while the
    /// deployment-wide `tls` entry is left as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
    /// Internal cluster authentication mode (`x509`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_auth_mode: Option<String>,
    /// wiredTiger cache size in GB (mongod only)
    #[serde(default, rename = "wiredTigerCacheSizeGB", skip_serializing_if = "Option::is_none")]
    pub wired_tiger_cache_size_gb: Option<f64>,
    /// Extra `args2_6` settings deep-merged into every mongod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_mongod_config: Option<Object>,
    /// The `additionalMongodConfig` of the last apply. Keys it has that the current one
    /// dropped are removed from the deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_additional_mongod_config: Option<Object>,
}

/// TLS settings of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    /// `net.tls.mode` of every process
    pub mode: TlsMode,
    /// Server certificate path inside the container
    #[serde(default = "default_pem_key_file")]
    pub pem_key_file: String,
    /// CA file path written to the deployment-wide `tls` settings
    #[serde(default = "default_ca_file")]
    pub ca_file: String,
}

fn default_pem_key_file() -> String {
    PEM_KEY_FILE_PATH_IN_CONTAINER.to_string()
}

fn default_ca_file() -> String {
    CA_FILE_PATH_IN_CONTAINER.to_string()
}

/// A standalone mongod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneTopology {
    /// Process name
    pub name: String,
    /// Host the process runs on
    pub hostname: String,
    /// Process settings
    #[serde(flatten)]
    pub settings: ProcessSettings,
}

/// One replica set member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTopology {
    /// Host the member's mongod runs on
    pub hostname: String,
    /// Votes, priority, tags and horizons
    #[serde(flatten)]
    pub options: MemberOptions,
}

/// A replica set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetTopology {
    /// Replica set name
    pub name: String,
    /// Members in order; member `i` runs process `<name>-<i>`
    pub members: Vec<MemberTopology>,
    /// Process settings
    #[serde(flatten)]
    pub settings: ProcessSettings,
}

/// The members of one shard or of the config server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardTopology {
    /// Members in order
    pub members: Vec<MemberTopology>,
}

/// A sharded cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardedClusterTopology {
    /// Cluster name
    pub name: String,
    /// Hosts of the mongos routers
    pub mongos: Vec<String>,
    /// Config server replica set
    pub config_server: ShardTopology,
    /// Shards in order; shard `i` is replica set `<name>-<i>`
    pub shards: Vec<ShardTopology>,
    /// Process settings
    #[serde(flatten)]
    pub settings: ProcessSettings,
}

/// What applying a topology dropped from the deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Processes removed, sorted
    pub removed_processes: Vec<String>,
    /// Shards no longer part of the cluster, sorted
    pub removed_shards: Vec<String>,
}

impl ProcessSettings {
    /// A mongod named `name` on `hostname`.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeploymentError::InvalidVersion`] for an unparseable version.
    pub fn mongod(&self, name: &str, hostname: &str) -> Result<Process> {
        let mut process = Process::new_mongod(
            name,
            hostname,
            &self.version,
            self.feature_compatibility_version.as_deref(),
        )?;
        if let Some(cache) = self.wired_tiger_cache_size_gb {
            process.set_wired_tiger_cache(cache)?;
        }
        self.secure(&mut process)?;
        Ok(process)
    }

    /// A mongos named `name` on `hostname`.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeploymentError::InvalidVersion`] for an unparseable version.
    pub fn mongos(&self, name: &str, hostname: &str) -> Result<Process> {
        let mut process = Process::new_mongos(
            name,
            hostname,
            &self.version,
            self.feature_compatibility_version.as_deref(),
        )?;
        self.secure(&mut process)?;
        Ok(process)
    }

    /// Current and previous `additionalMongodConfig`.
    #[must_use]
    pub fn additional_config(&self) -> AdditionalConfig {
        AdditionalConfig::new(
            self.additional_mongod_config.clone().unwrap_or_default(),
            self.previous_additional_mongod_config.clone().unwrap_or_default(),
        )
    }

    fn secure(&self, process: &mut Process) -> Result<()> {
        if let Some(tls) = &self.tls {
            process.configure_tls(tls.mode, &tls.pem_key_file)?;
        }
        if let Some(mode) = &self.cluster_auth_mode {
            process.configure_cluster_auth_mode(mode)?;
        }
        Ok(())
    }

    fn replica_set(&self, name: &str, members: &[MemberTopology]) -> Result<ReplicaSetWithProcesses> {
        let processes = members
            .iter()
            .enumerate()
            .map(|(i, member)| self.mongod(&format!("{name}-{i}"), &member.hostname))
            .collect::<Result<Vec<_>>>()?;
        let options: Vec<MemberOptions> = members.iter().map(|m| m.options.clone()).collect();
        ReplicaSetWithProcesses::new(name, processes, &options)?
            .with_additional_config(self.additional_config())
    }
}

impl ReplicaSetTopology {
    /// The replica set and its processes.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeploymentError::InvalidVersion`] for an unparseable version.
    pub fn to_replica_set(&self) -> Result<ReplicaSetWithProcesses> {
        self.settings.replica_set(&self.name, &self.members)
    }
}

impl ShardedClusterTopology {
    /// Name of the config server replica set.
    #[must_use]
    pub fn config_server_name(&self) -> String {
        format!("{}-{CONFIG_SERVER_SUFFIX}", self.name)
    }

    /// Name of shard `index`.
    #[must_use]
    pub fn shard_name(&self, index: usize) -> String {
        format!("{}-{index}", self.name)
    }

    /// The full cluster: mongos processes, config server and shards.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeploymentError::InvalidVersion`] for an unparseable version.
    pub fn to_spec(&self) -> Result<ShardedClusterSpec> {
        let mongos = self
            .mongos
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let mut process = self
                    .settings
                    .mongos(&format!("{}-{MONGOS_INFIX}-{i}", self.name), host)?;
                process.set_cluster(&self.name);
                Ok(process)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut config_server = self
            .settings
            .replica_set(&self.config_server_name(), &self.config_server.members)?;
        for process in &mut config_server.processes {
            process.set_cluster_role_config_server()?;
        }

        let shards = self
            .shards
            .iter()
            .enumerate()
            .map(|(i, shard)| self.settings.replica_set(&self.shard_name(i), &shard.members))
            .collect::<Result<Vec<_>>>()?;

        Ok(ShardedClusterSpec {
            name: self.name.clone(),
            mongos,
            mongos_config: AdditionalConfig::default(),
            config_server,
            shards,
        })
    }
}

impl Topology {
    /// Parse a topology from YAML. JSON is accepted as well.
    ///
    /// # Errors
    ///
    /// The parser error if the text is not a valid topology.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Name of the resource.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Standalone(t) => &t.name,
            Self::ReplicaSet(t) => &t.name,
            Self::ShardedCluster(t) => &t.name,
        }
    }

    /// Kind of the resource.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Standalone(_) => ResourceKind::Standalone,
            Self::ReplicaSet(_) => ResourceKind::ReplicaSet,
            Self::ShardedCluster(_) => ResourceKind::ShardedCluster,
        }
    }

    fn settings(&self) -> &ProcessSettings {
        match self {
            Self::Standalone(t) => &t.settings,
            Self::ReplicaSet(t) => &t.settings,
            Self::ShardedCluster(t) => &t.settings,
        }
    }

    /// Merge the topology into `deployment`.
    ///
    /// When TLS is enabled the deployment-wide CA file is set as well.
    ///
    /// # Errors
    ///
    /// Any merge error; the deployment is unchanged on error.
    pub fn apply(&self, deployment: &mut Deployment) -> Result<MergeReport> {
        let mut staged = deployment.clone();
        let report = match self {
            Self::Standalone(t) => {
                staged.merge_standalone_with_config(
                    t.settings.mongod(&t.name, &t.hostname)?,
                    &t.settings.additional_config(),
                )?;
                MergeReport::default()
            }
            Self::ReplicaSet(t) => MergeReport {
                removed_processes: staged.merge_replica_set(t.to_replica_set()?)?,
                removed_shards: Vec::new(),
            },
            Self::ShardedCluster(t) => {
                let merge = staged.merge_sharded_cluster(&t.to_spec()?)?;
                MergeReport {
                    removed_processes: merge.removed_processes,
                    removed_shards: merge.removed_shards,
                }
            }
        };

        if let Some(tls) = &self.settings().tls {
            if tls.mode != TlsMode::Disabled {
                staged.configure_tls(Some(&tls.ca_file))?;
            }
        }

        *deployment = staged;
        info!(
            kind = %self.kind(),
            name = %self.name(),
            removed_processes = ?report.removed_processes,
            removed_shards = ?report.removed_shards,
            "Applied topology"
        );
        Ok(report)
    }
}

/// Remove a resource by kind and name. Returns the removed process names, sorted.
///
/// # Errors
///
/// The lookup error of the matching removal (`ProcessNotFound`, `ReplicaSetNotFound`,
/// `ShardedClusterNotFound`) or a dangling-reference error for a replica set still used
/// by a cluster.
pub fn remove_resource(deployment: &mut Deployment, kind: ResourceKind, name: &str) -> Result<Vec<String>> {
    match kind {
        ResourceKind::Standalone => {
            deployment.remove_process_by_name(name)?;
            Ok(vec![name.to_string()])
        }
        ResourceKind::ReplicaSet => deployment.remove_replica_set_by_name(name),
        ResourceKind::ShardedCluster => deployment.remove_sharded_cluster_by_name(name),
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod topology_tests;
