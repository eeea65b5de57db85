// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cli.rs`

#[cfg(test)]
mod tests {
    use super::super::{run, Cli, Command, KindArg};
    use crate::deployment::Deployment;
    use clap::Parser;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;

    const REPLICA_SET: &str = r#"
type: replicaSet
name: shop
version: "6.0.5"
members:
  - hostname: shop-0.svc
  - hostname: shop-1.svc
  - hostname: shop-2.svc
"#;

    fn sharded(shards: usize) -> String {
        let mut text = String::from(
            "type: shardedCluster\nname: sc\nversion: \"6.0.5\"\nmongos:\n  - sc-mongos-0.svc\n\
             configServer:\n  members:\n    - hostname: sc-config-0.svc\nshards:\n",
        );
        for i in 0..shards {
            text.push_str(&format!("  - members:\n      - hostname: sc-{i}-0.svc\n"));
        }
        text
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn read_document(path: &str) -> Deployment {
        Deployment::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    async fn run_args(args: &[&str]) -> anyhow::Result<Value> {
        let mut argv = vec!["om-deployment"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        Ok(serde_json::from_str(&run(cli).await?)?)
    }

    #[test]
    fn test_parse_remove_command() {
        let cli = Cli::try_parse_from([
            "om-deployment",
            "remove",
            "--document",
            "ac.json",
            "--kind",
            "replica-set",
            "--name",
            "shop",
        ])
        .unwrap();

        let Command::Remove(args) = cli.command else {
            panic!("expected remove");
        };
        assert_eq!(args.kind, KindArg::ReplicaSet);
        assert_eq!(args.name, "shop");
        assert_eq!(args.target.project, "default");
        assert!(!args.target.create);
    }

    #[test]
    fn test_drain_and_finalize_conflict() {
        let result = Cli::try_parse_from([
            "om-deployment",
            "merge",
            "-d",
            "ac.json",
            "-t",
            "sc.yaml",
            "--drain-removed-shards",
            "--finalize-shard-removal",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_merge_creates_document() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let document = dir.path().join("ac.json");
        let document = document.to_str().unwrap();

        let summary = run_args(&["merge", "-d", document, "-t", &topology, "--create"])
            .await
            .unwrap();

        assert_eq!(summary["changed"], json!(true));
        assert_eq!(summary["kind"], json!("replica_set"));
        let deployment = read_document(document);
        assert_eq!(deployment.number_of_processes().unwrap(), 3);
        deployment.validate().unwrap();
    }

    #[tokio::test]
    async fn test_merge_without_create_requires_document() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let missing = dir.path().join("missing.json");

        let err = run_args(&["merge", "-d", missing.to_str().unwrap(), "-t", &topology])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read document"));
    }

    #[tokio::test]
    async fn test_second_merge_reports_unchanged() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let document = dir.path().join("ac.json");
        let document = document.to_str().unwrap();

        run_args(&["merge", "-d", document, "-t", &topology, "--create"])
            .await
            .unwrap();
        let first = std::fs::read(document).unwrap();
        let summary = run_args(&["merge", "-d", document, "-t", &topology])
            .await
            .unwrap();

        assert_eq!(summary["changed"], json!(false));
        assert_eq!(std::fs::read(document).unwrap(), first);
    }

    #[tokio::test]
    async fn test_merge_to_output_keeps_input() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let empty = serde_json::to_string(&Deployment::new()).unwrap();
        let document = write(&dir, "ac.json", &empty);
        let output = dir.path().join("out.json");
        let output = output.to_str().unwrap();

        run_args(&["merge", "-d", &document, "-t", &topology, "-o", output])
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&document).unwrap(), empty);
        assert_eq!(read_document(output).number_of_processes().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove_replica_set() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let document = dir.path().join("ac.json");
        let document = document.to_str().unwrap();
        run_args(&["merge", "-d", document, "-t", &topology, "--create"])
            .await
            .unwrap();

        let summary = run_args(&["remove", "-d", document, "-k", "replica-set", "-n", "shop"])
            .await
            .unwrap();

        assert_eq!(summary["removedProcesses"], json!(["shop-0", "shop-1", "shop-2"]));
        let deployment = read_document(document);
        assert_eq!(deployment.number_of_processes().unwrap(), 0);
        assert!(deployment.replica_sets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_resource_leaves_document() {
        let dir = TempDir::new().unwrap();
        let empty = serde_json::to_string(&Deployment::new()).unwrap();
        let document = write(&dir, "ac.json", &empty);

        let err = run_args(&["remove", "-d", &document, "-k", "standalone", "-n", "ghost"])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to remove standalone 'ghost'"));
        assert_eq!(std::fs::read_to_string(&document).unwrap(), empty);
    }

    #[tokio::test]
    async fn test_shard_options_require_sharded_cluster() {
        let dir = TempDir::new().unwrap();
        let topology = write(&dir, "rs.yaml", REPLICA_SET);
        let document = dir.path().join("ac.json");

        let err = run_args(&[
            "merge",
            "-d",
            document.to_str().unwrap(),
            "-t",
            &topology,
            "--create",
            "--drain-removed-shards",
        ])
        .await
        .unwrap_err();
        assert!(err.to_string().contains("only apply to sharded clusters"));
    }

    #[tokio::test]
    async fn test_shard_removal_in_two_phases() {
        let dir = TempDir::new().unwrap();
        let two_shards = write(&dir, "sc2.yaml", &sharded(2));
        let one_shard = write(&dir, "sc1.yaml", &sharded(1));
        let document = dir.path().join("ac.json");
        let document = document.to_str().unwrap();

        run_args(&["merge", "-d", document, "-t", &two_shards, "--create"])
            .await
            .unwrap();

        let summary = run_args(&["merge", "-d", document, "-t", &one_shard, "--drain-removed-shards"])
            .await
            .unwrap();
        assert_eq!(summary["removedShards"], json!(["sc-1"]));
        assert_eq!(summary["drainingReplicaSets"], json!(["sc-1"]));
        let deployment = read_document(document);
        assert!(deployment.find_replica_set("sc-1").unwrap().is_some());
        let cluster = deployment.find_sharded_cluster("sc").unwrap().unwrap();
        assert_eq!(cluster.draining().unwrap(), vec!["sc-1"]);

        let summary = run_args(&["merge", "-d", document, "-t", &one_shard, "--finalize-shard-removal"])
            .await
            .unwrap();
        assert_eq!(summary["finalizedProcesses"], json!(["sc-1-0"]));
        let deployment = read_document(document);
        assert!(deployment.find_replica_set("sc-1").unwrap().is_none());
        assert!(deployment.find_process("sc-1-0").unwrap().is_none());
        deployment.validate().unwrap();
    }

    #[tokio::test]
    async fn test_validate_reports_dangling_member() {
        let dir = TempDir::new().unwrap();
        let mut document = Deployment::new().to_value();
        document["replicaSets"] = json!([{
            "_id": "shop",
            "members": [{"_id": 0, "host": "shop-0"}]
        }]);
        let path = write(&dir, "ac.json", &document.to_string());

        let err = run_args(&["validate", "-d", &path]).await.unwrap_err();
        assert!(err.to_string().contains("is invalid"));

        let valid = write(&dir, "ok.json", &Deployment::new().to_value().to_string());
        let summary = run_args(&["validate", "-d", &valid]).await.unwrap();
        assert_eq!(summary["valid"], json!(true));
        assert_eq!(summary["processes"], json!(0));
        assert!(Path::new(&valid).exists());
    }
}
