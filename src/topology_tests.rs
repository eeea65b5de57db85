// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `topology.rs`

#[cfg(test)]
mod tests {
    use super::super::{remove_resource, Topology};
    use crate::deployment::{Deployment, ProcessType, ResourceKind, TlsMode};
    use crate::errors::DeploymentError;
    use serde_json::json;

    const REPLICA_SET: &str = r#"
type: replicaSet
name: shop
version: "6.0.5"
wiredTigerCacheSizeGB: 1.5
members:
  - hostname: shop-0.svc
  - hostname: shop-1.svc
    priority: 2
  - hostname: shop-2.svc
    votes: 0
    priority: 0
"#;

    const SHARDED: &str = r#"
type: shardedCluster
name: sc
version: "6.0.5"
tls:
  mode: requireSSL
mongos:
  - sc-mongos-0.svc
  - sc-mongos-1.svc
configServer:
  members:
    - hostname: sc-config-0.svc
    - hostname: sc-config-1.svc
    - hostname: sc-config-2.svc
shards:
  - members:
      - hostname: sc-0-0.svc
      - hostname: sc-0-1.svc
      - hostname: sc-0-2.svc
  - members:
      - hostname: sc-1-0.svc
      - hostname: sc-1-1.svc
      - hostname: sc-1-2.svc
"#;

    #[test]
    fn test_parse_replica_set() {
        let topology = Topology::from_yaml(REPLICA_SET).unwrap();
        assert_eq!(topology.kind(), ResourceKind::ReplicaSet);
        assert_eq!(topology.name(), "shop");

        let Topology::ReplicaSet(rs) = topology else {
            panic!("expected a replica set");
        };
        assert_eq!(rs.members.len(), 3);
        assert_eq!(rs.members[1].options.priority, Some(2.0));
        assert_eq!(rs.members[2].options.votes, Some(0));
        assert_eq!(rs.settings.wired_tiger_cache_size_gb, Some(1.5));
    }

    #[test]
    fn test_parse_json_standalone() {
        let topology = Topology::from_yaml(
            r#"{"type": "standalone", "name": "solo", "hostname": "solo.svc", "version": "5.0.14"}"#,
        )
        .unwrap();
        assert_eq!(topology.kind(), ResourceKind::Standalone);
        assert_eq!(topology.name(), "solo");
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(Topology::from_yaml("type: cluster\nname: x\nversion: \"6.0.5\"").is_err());
    }

    #[test]
    fn test_replica_set_member_names_and_options() {
        let Topology::ReplicaSet(rs) = Topology::from_yaml(REPLICA_SET).unwrap() else {
            panic!("expected a replica set");
        };
        let built = rs.to_replica_set().unwrap();

        let names: Vec<&str> = built.processes.iter().map(|p| p.name().unwrap()).collect();
        assert_eq!(names, vec!["shop-0", "shop-1", "shop-2"]);
        for process in &built.processes {
            assert_eq!(process.replica_set_name().unwrap(), Some("shop"));
            assert_eq!(process.wired_tiger_cache().unwrap(), Some(1.5));
        }

        let members = built.replica_set.members().unwrap();
        assert_eq!(members[0].host().unwrap(), "shop-0");
        assert_eq!(members[1].priority().unwrap(), Some(2.0));
        assert_eq!(members[2].votes().unwrap(), 0);
    }

    #[test]
    fn test_sharded_cluster_naming() {
        let Topology::ShardedCluster(sc) = Topology::from_yaml(SHARDED).unwrap() else {
            panic!("expected a sharded cluster");
        };
        let spec = sc.to_spec().unwrap();

        assert_eq!(spec.name, "sc");
        assert_eq!(spec.config_server.name().unwrap(), "sc-config");
        assert_eq!(spec.shards[0].name().unwrap(), "sc-0");
        assert_eq!(spec.shards[1].name().unwrap(), "sc-1");
        assert_eq!(spec.shards[1].processes[2].name().unwrap(), "sc-1-2");

        let mongos: Vec<&str> = spec.mongos.iter().map(|p| p.name().unwrap()).collect();
        assert_eq!(mongos, vec!["sc-mongos-0", "sc-mongos-1"]);
        for process in &spec.mongos {
            assert_eq!(process.process_type().unwrap(), ProcessType::Mongos);
            assert_eq!(process.cluster().unwrap(), Some("sc"));
            assert!(process.is_tls_enabled().unwrap());
        }
        assert!(spec.config_server.processes[0].is_config_server().unwrap());
    }

    #[test]
    fn test_apply_sharded_cluster_enables_deployment_tls() {
        let topology = Topology::from_yaml(SHARDED).unwrap();
        let mut deployment = Deployment::new();
        deployment.configure_tls(None).unwrap();

        let report = topology.apply(&mut deployment).unwrap();

        assert!(report.removed_processes.is_empty());
        assert!(report.removed_shards.is_empty());
        assert_eq!(deployment.number_of_processes().unwrap(), 2 + 3 + 6);
        assert!(deployment.all_processes_tls_enabled().unwrap());
        assert_eq!(
            deployment.object()["tls"]["CAFilePath"],
            json!("/mongodb-automation/ca.pem")
        );
        deployment.validate().unwrap();
    }

    #[test]
    fn test_apply_replica_set_scale_down_reports_removed() {
        let mut deployment = Deployment::new();
        Topology::from_yaml(REPLICA_SET)
            .unwrap()
            .apply(&mut deployment)
            .unwrap();

        let Topology::ReplicaSet(mut rs) = Topology::from_yaml(REPLICA_SET).unwrap() else {
            panic!("expected a replica set");
        };
        rs.members.truncate(1);
        let report = Topology::ReplicaSet(rs).apply(&mut deployment).unwrap();

        assert_eq!(report.removed_processes, vec!["shop-1", "shop-2"]);
        assert_eq!(deployment.all_process_names().unwrap(), vec!["shop-0"]);
    }

    #[test]
    fn test_apply_failure_leaves_deployment_unchanged() {
        let topology = Topology::from_yaml(
            "type: standalone\nname: solo\nhostname: solo.svc\nversion: \"not-a-version\"",
        )
        .unwrap();
        let mut deployment = Deployment::new();
        let before = deployment.clone();

        let err = topology.apply(&mut deployment).unwrap_err();

        assert!(matches!(err, DeploymentError::InvalidVersion { .. }));
        assert_eq!(deployment, before);
    }

    #[test]
    fn test_disabled_tls_does_not_touch_deployment_tls() {
        let topology = Topology::from_yaml(
            "type: standalone\nname: solo\nhostname: solo.svc\nversion: \"6.0.5\"\ntls:\n  mode: disabled",
        )
        .unwrap();
        let mut deployment = Deployment::new();
        deployment.configure_tls(None).unwrap();

        topology.apply(&mut deployment).unwrap();

        assert!(!deployment.object().contains_key("tls"));
        let process = deployment.find_process("solo").unwrap().unwrap();
        assert!(!process.is_tls_enabled().unwrap());
        let Topology::Standalone(s) = topology else {
            panic!("expected a standalone");
        };
        assert_eq!(s.settings.tls.unwrap().mode, TlsMode::Disabled);
    }

    #[test]
    fn test_remove_resource_by_kind() {
        let mut deployment = Deployment::new();
        Topology::from_yaml(REPLICA_SET)
            .unwrap()
            .apply(&mut deployment)
            .unwrap();

        let removed = remove_resource(&mut deployment, ResourceKind::ReplicaSet, "shop").unwrap();
        assert_eq!(removed, vec!["shop-0", "shop-1", "shop-2"]);
        assert_eq!(deployment.number_of_processes().unwrap(), 0);

        let err = remove_resource(&mut deployment, ResourceKind::Standalone, "shop-0").unwrap_err();
        assert!(matches!(err, DeploymentError::ProcessNotFound { .. }));
    }

    fn shop_with_config(config: &str) -> Topology {
        Topology::from_yaml(&format!(
            "type: replicaSet\nname: shop\nversion: \"6.0.5\"\nmembers:\n  - hostname: shop-0.svc\n{config}"
        ))
        .unwrap()
    }

    fn set_parameter(deployment: &Deployment) -> Option<serde_json::Value> {
        let process = deployment.find_process("shop-0").unwrap().unwrap();
        process.args().unwrap().unwrap().get("setParameter").cloned()
    }

    #[test]
    fn test_additional_mongod_config_follows_changes() {
        let mut deployment = Deployment::new();

        shop_with_config(
            "additionalMongodConfig:\n  setParameter:\n    maxIndexBuildMemoryUsageMegabytes: 100\n",
        )
        .apply(&mut deployment)
        .unwrap();
        assert_eq!(
            set_parameter(&deployment),
            Some(json!({"maxIndexBuildMemoryUsageMegabytes": 100}))
        );

        shop_with_config(concat!(
            "additionalMongodConfig:\n  setParameter:\n    maxIndexBuildMemoryUsageMegabytes: 200\n",
            "previousAdditionalMongodConfig:\n  setParameter:\n    maxIndexBuildMemoryUsageMegabytes: 100\n",
        ))
        .apply(&mut deployment)
        .unwrap();
        assert_eq!(
            set_parameter(&deployment),
            Some(json!({"maxIndexBuildMemoryUsageMegabytes": 200}))
        );

        shop_with_config(
            "previousAdditionalMongodConfig:\n  setParameter:\n    maxIndexBuildMemoryUsageMegabytes: 200\n",
        )
        .apply(&mut deployment)
        .unwrap();
        assert_eq!(set_parameter(&deployment), None);
        deployment.validate().unwrap();
    }

    #[test]
    fn test_unset_tls_removes_process_tls_only() {
        let mut deployment = Deployment::new();
        Topology::from_yaml(SHARDED)
            .unwrap()
            .apply(&mut deployment)
            .unwrap();
        assert!(deployment.all_processes_tls_enabled().unwrap());

        let Topology::ShardedCluster(mut sc) = Topology::from_yaml(SHARDED).unwrap() else {
            panic!("expected a sharded cluster");
        };
        sc.settings.tls = None;
        Topology::ShardedCluster(sc).apply(&mut deployment).unwrap();

        for process in deployment.processes().unwrap() {
            assert!(process.tls_config().unwrap().is_none());
        }
        assert_eq!(
            deployment.object()["tls"]["CAFilePath"],
            json!("/mongodb-automation/ca.pem")
        );
    }
}
