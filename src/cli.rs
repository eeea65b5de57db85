// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line interface of the `om-deployment` binary.
//!
//! Works offline on automation config documents stored as JSON files:
//!
//! - `merge` applies a desired topology (YAML or JSON) to a document
//! - `remove` drops a standalone, replica set or sharded cluster
//! - `validate` checks the referential integrity of a document
//!
//! Every command prints a JSON summary on stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{debug, info};

use crate::connection::{read_update_deployment, InMemoryConnection, ProjectLocks};
use crate::deployment::{Deployment, ResourceKind};
use crate::topology::{remove_resource, Topology};

/// Merge desired MongoDB topologies into Ops Manager automation configs.
#[derive(Debug, Parser)]
#[command(name = "om-deployment", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge a desired topology into an automation config.
    Merge(MergeArgs),
    /// Remove a resource and its processes from an automation config.
    Remove(RemoveArgs),
    /// Check that every reference in an automation config resolves.
    Validate(ValidateArgs),
}

/// The document a command updates.
#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// Automation config document (JSON).
    #[arg(long, short = 'd', value_name = "FILE", env = "OM_DEPLOYMENT_DOCUMENT")]
    pub document: PathBuf,

    /// Where to write the result. Defaults to updating the document in place.
    #[arg(long, short = 'o', value_name = "FILE", env = "OM_DEPLOYMENT_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Start from an empty automation config when the document does not exist.
    #[arg(long)]
    pub create: bool,

    /// Ops Manager project name, used in logs.
    #[arg(long, env = "OM_DEPLOYMENT_PROJECT", default_value = "default")]
    pub project: String,

    /// Ops Manager organization id, used in logs.
    #[arg(long, env = "OM_DEPLOYMENT_ORG_ID", default_value = "")]
    pub org_id: String,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub target: DocumentArgs,

    /// Desired topology (YAML or JSON).
    #[arg(long, short = 't', value_name = "FILE", env = "OM_DEPLOYMENT_TOPOLOGY")]
    pub topology: PathBuf,

    /// Add replica sets of shards dropped from the cluster to its draining list.
    #[arg(long)]
    pub drain_removed_shards: bool,

    /// Remove drained shard replica sets and their processes.
    #[arg(long, conflicts_with = "drain_removed_shards")]
    pub finalize_shard_removal: bool,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub target: DocumentArgs,

    /// Kind of the resource to remove.
    #[arg(long, short = 'k', value_enum)]
    pub kind: KindArg,

    /// Name of the resource to remove.
    #[arg(long, short = 'n')]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Automation config document (JSON).
    #[arg(long, short = 'd', value_name = "FILE", env = "OM_DEPLOYMENT_DOCUMENT")]
    pub document: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Standalone,
    ReplicaSet,
    ShardedCluster,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Standalone => Self::Standalone,
            KindArg::ReplicaSet => Self::ReplicaSet,
            KindArg::ShardedCluster => Self::ShardedCluster,
        }
    }
}

/// Run a parsed command line. Returns the JSON summary to print.
///
/// # Errors
///
/// File access, parse, merge and validation errors, with the failing file as context.
pub async fn run(cli: Cli) -> Result<String> {
    let summary = match cli.command {
        Command::Merge(args) => merge(args).await?,
        Command::Remove(args) => remove(args).await?,
        Command::Validate(args) => validate(&args.document).await?,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

async fn merge(args: MergeArgs) -> Result<serde_json::Value> {
    let text = tokio::fs::read_to_string(&args.topology)
        .await
        .with_context(|| format!("Failed to read topology {}", args.topology.display()))?;
    let topology = Topology::from_yaml(&text)
        .with_context(|| format!("Invalid topology {}", args.topology.display()))?;

    if (args.drain_removed_shards || args.finalize_shard_removal)
        && topology.kind() != ResourceKind::ShardedCluster
    {
        bail!(
            "Shard removal options only apply to sharded clusters, '{}' is a {}",
            topology.name(),
            topology.kind()
        );
    }

    let conn = connect(&args.target).await?;
    let locks = ProjectLocks::new();
    let name = topology.name().to_string();

    let (report, draining, finalized) = read_update_deployment(&conn, &locks, |d| {
        let mut report = topology.apply(d)?;
        let mut draining = Vec::new();
        let mut finalized = Vec::new();
        if args.drain_removed_shards {
            draining = d.mark_shards_draining(&name)?;
        }
        if args.finalize_shard_removal {
            finalized = d.finalize_shard_removal(&name)?;
            report.removed_processes.extend(finalized.iter().cloned());
            report.removed_processes.sort();
            report.removed_processes.dedup();
        }
        Ok((report, draining, finalized))
    })
    .await
    .with_context(|| format!("Failed to merge {} '{}'", topology.kind(), name))?;

    let changed = conn.update_count() > 0;
    persist(&args.target, conn, changed).await?;

    Ok(json!({
        "kind": topology.kind().as_str(),
        "name": name,
        "changed": changed,
        "removedProcesses": report.removed_processes,
        "removedShards": report.removed_shards,
        "drainingReplicaSets": draining,
        "finalizedProcesses": finalized,
    }))
}

async fn remove(args: RemoveArgs) -> Result<serde_json::Value> {
    let kind = ResourceKind::from(args.kind);
    let conn = connect(&args.target).await?;
    let locks = ProjectLocks::new();

    let removed = read_update_deployment(&conn, &locks, |d| remove_resource(d, kind, &args.name))
        .await
        .with_context(|| format!("Failed to remove {kind} '{}'", args.name))?;

    persist(&args.target, conn, true).await?;

    Ok(json!({
        "kind": kind.as_str(),
        "name": args.name,
        "removedProcesses": removed,
    }))
}

async fn validate(path: &Path) -> Result<serde_json::Value> {
    let deployment = load(path, false).await?;
    deployment
        .validate()
        .with_context(|| format!("Document {} is invalid", path.display()))?;

    info!(document = %path.display(), "Document is valid");
    Ok(json!({
        "valid": true,
        "processes": deployment.number_of_processes()?,
        "replicaSets": deployment.replica_sets()?.len(),
        "shardedClusters": deployment.sharded_clusters()?.len(),
        "fingerprint": deployment.fingerprint()?,
    }))
}

async fn connect(target: &DocumentArgs) -> Result<InMemoryConnection> {
    let deployment = load(&target.document, target.create).await?;
    Ok(InMemoryConnection::new(
        &target.project,
        &target.org_id,
        deployment,
    ))
}

async fn load(path: &Path, create: bool) -> Result<Deployment> {
    if create && !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(document = %path.display(), "Document does not exist, starting from an empty one");
        return Ok(Deployment::new());
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    Deployment::from_slice(&bytes).with_context(|| format!("Invalid document {}", path.display()))
}

/// Write the document to `--output`, or back in place when it changed.
async fn persist(target: &DocumentArgs, conn: InMemoryConnection, changed: bool) -> Result<()> {
    let path = match (&target.output, changed) {
        (Some(output), _) => output,
        (None, true) => &target.document,
        (None, false) => {
            debug!(document = %target.document.display(), "Document unchanged, not rewriting it");
            return Ok(());
        }
    };
    let deployment = conn.into_deployment();
    let mut bytes = serde_json::to_vec_pretty(&deployment)?;
    bytes.push(b'\n');
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write document {}", path.display()))?;
    info!(document = %path.display(), "Wrote automation config");
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
