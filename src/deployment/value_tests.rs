// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `value.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        as_integer, ensure_path, get_array, get_integer, get_path, get_path_str, get_str,
        merge_objects, read_or_create_array, read_or_create_map, remove_dropped_fields,
        require_str, tls_key, Object,
    };
    use crate::errors::DeploymentError;
    use serde_json::{json, Value};

    fn object(value: Value) -> Object {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_get_str_shapes() {
        let obj = object(json!({"name": "rs0", "port": 27017, "alias": null}));

        assert_eq!(get_str(&obj, "name", "").unwrap(), Some("rs0"));
        assert_eq!(get_str(&obj, "alias", "").unwrap(), None);
        assert_eq!(get_str(&obj, "absent", "").unwrap(), None);

        let err = get_str(&obj, "port", "processes[0]").unwrap_err();
        assert_eq!(
            err,
            DeploymentError::Structure {
                path: "processes[0].port".to_string(),
                expected: "string",
                found: "number",
            }
        );
    }

    #[test]
    fn test_require_str_reports_missing() {
        let obj = object(json!({}));
        let err = require_str(&obj, "name", "processes[2]").unwrap_err();
        assert_eq!(
            err,
            DeploymentError::Structure {
                path: "processes[2].name".to_string(),
                expected: "string",
                found: "missing",
            }
        );
    }

    #[test]
    fn test_integers_accept_integral_floats() {
        assert_eq!(as_integer(&json!(3)), Some(3));
        assert_eq!(as_integer(&json!(2.0)), Some(2));
        assert_eq!(as_integer(&json!(2.5)), None);
        assert_eq!(as_integer(&json!("2")), None);

        let obj = object(json!({"_id": 1.0, "votes": "one"}));
        assert_eq!(get_integer(&obj, "_id", "").unwrap(), Some(1));
        assert!(get_integer(&obj, "votes", "").unwrap_err().is_structural());
    }

    #[test]
    fn test_read_or_create_map_inserts_and_rejects() {
        let mut obj = object(json!({"net": null, "ssl": []}));

        read_or_create_map(&mut obj, "net", "")
            .unwrap()
            .insert("port".into(), json!(27017));
        assert_eq!(obj["net"], json!({"port": 27017}));

        read_or_create_map(&mut obj, "security", "").unwrap();
        assert_eq!(obj["security"], json!({}));

        let err = read_or_create_map(&mut obj, "ssl", "args2_6").unwrap_err();
        assert!(matches!(err, DeploymentError::Structure { ref path, found: "array", .. } if path == "args2_6.ssl"));
    }

    #[test]
    fn test_read_or_create_array() {
        let mut obj = object(json!({"members": "oops"}));
        read_or_create_array(&mut obj, "processes", "").unwrap().push(json!({}));
        assert_eq!(get_array(&obj, "processes", "").unwrap().map(Vec::len), Some(1));
        assert!(read_or_create_array(&mut obj, "members", "").is_err());
    }

    #[test]
    fn test_nested_paths() {
        let mut obj = object(json!({"net": {"ssl": {"mode": "requireSSL"}}, "storage": 1}));

        assert_eq!(
            get_path_str(&obj, &["net", "ssl", "mode"], "args2_6").unwrap(),
            Some("requireSSL")
        );
        assert_eq!(get_path(&obj, &["net", "tls", "mode"], "").unwrap(), None);
        assert!(get_path(&obj, &["storage", "dbPath"], "").is_err());

        ensure_path(&mut obj, &["security", "x509"], "")
            .unwrap()
            .insert("clusterFile".into(), json!("/pem"));
        assert_eq!(obj["security"]["x509"]["clusterFile"], json!("/pem"));
    }

    #[test]
    fn test_tls_key_prefers_tls() {
        assert_eq!(tls_key(&object(json!({}))), "tls");
        assert_eq!(tls_key(&object(json!({"ssl": {}}))), "ssl");
        assert_eq!(tls_key(&object(json!({"tls": {}, "ssl": {}}))), "tls");
    }

    #[test]
    fn test_merge_objects_descends_into_nested_maps() {
        let mut target = object(json!({
            "net": {"port": 27017, "bindIp": "0.0.0.0"},
            "setParameter": {"maxIndexBuildMemoryUsageMegabytes": 100},
            "storage": "legacy"
        }));
        let source = object(json!({
            "net": {"port": 27018},
            "setParameter": {"maxIndexBuildMemoryUsageMegabytes": 200},
            "storage": {"dbPath": "/data"}
        }));

        merge_objects(&mut target, &source);

        assert_eq!(target["net"], json!({"port": 27018, "bindIp": "0.0.0.0"}));
        assert_eq!(target["setParameter"]["maxIndexBuildMemoryUsageMegabytes"], json!(200));
        assert_eq!(target["storage"], json!({"dbPath": "/data"}));
    }

    #[test]
    fn test_remove_dropped_fields() {
        let mut target = object(json!({
            "net": {"port": 27017, "bindIpAll": true},
            "setParameter": {"a": 1, "b": 2},
            "auditLog": {"destination": "file"},
            "systemLog": {"path": "/log"}
        }));
        let desired = object(json!({"net": {"port": 27017}, "setParameter": {"a": 1}}));
        let previous = object(json!({
            "net": {"bindIpAll": true},
            "setParameter": {"a": 1, "b": 2},
            "auditLog": {"destination": "file"}
        }));

        remove_dropped_fields(&mut target, &desired, &previous);

        assert_eq!(
            Value::Object(target),
            json!({
                "net": {"port": 27017},
                "setParameter": {"a": 1},
                "systemLog": {"path": "/log"}
            })
        );
    }
}
