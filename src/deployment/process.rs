// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process entries of the automation config (`processes[]`).
//!
//! A [`Process`] is a lens over a JSON object. The type parameter decides what it holds:
//!
//! - `Process` (owned [`Object`]) - a desired process built by the operator
//! - [`ProcessView`] (`&Object`) - a read-only view into a deployment
//! - [`ProcessViewMut`] (`&mut Object`) - an in-place editor of a deployment entry
//!
//! Only the keys listed in [`Process::merge_from`] are owned by the operator. Every other
//! key (log rotation, `alias`, `disabled`, auth settings injected by Ops Manager) is left
//! exactly as found. TLS settings live under `net.tls`; processes still using the legacy
//! `net.ssl` name keep it.
//!
//! ```json
//! {
//!   "args2_6": {
//!     "net": { "port": 27017, "tls": { "mode": "requireSSL", "PEMKeyFile": "/mongodb-automation/server.pem" } },
//!     "replication": { "replSetName": "blue" },
//!     "storage": { "dbPath": "/data" },
//!     "systemLog": { "destination": "file", "path": "/var/log/mongodb-mms-automation/mongodb.log" }
//!   },
//!   "hostname": "blue-0.blue-svc.ns.svc.cluster.local",
//!   "logRotate": { "sizeThresholdMB": 1000, "timeThresholdHrs": 24 },
//!   "name": "blue-0",
//!   "processType": "mongod",
//!   "version": "4.0.6",
//!   "featureCompatibilityVersion": "4.0",
//!   "authSchemaVersion": 5
//! }
//! ```

use std::borrow::{Borrow, BorrowMut};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::value::{
    ensure_path, get_bool, get_integer, get_object, get_object_mut, get_path, get_path_str,
    get_str, merge_objects, read_or_create_map, remove_dropped_fields, require_str,
    structure_error, tls_key, Object,
};
use super::version::{auth_schema_version, default_feature_compatibility_version};
use crate::constants::{
    ARGS_KEY, CLUSTER_ROLE_CONFIG_SERVER, DEFAULT_DB_PATH, DEFAULT_LOG_PATH, DEFAULT_MONGODB_PORT,
    INTERNAL_CLUSTER_AUTH_MOUNT_PATH, SSL_KEY, TLS_KEY, X509_CLUSTER_AUTH_MODE,
};
use crate::errors::Result;

/// Read-only lens into a deployment's process entry.
pub type ProcessView<'a> = Process<&'a Object>;

/// Mutable lens into a deployment's process entry.
pub type ProcessViewMut<'a> = Process<&'a mut Object>;

/// Kind of MongoDB process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// A data-bearing `mongod`
    Mongod,
    /// A `mongos` router
    Mongos,
}

impl ProcessType {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mongod => "mongod",
            Self::Mongos => "mongos",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS mode values understood by the automation agent (`net.tls.mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// TLS switched off; `PEMKeyFile` must not be present
    #[serde(rename = "disabled")]
    Disabled,
    /// `allowSSL`
    #[serde(rename = "allowSSL")]
    Allow,
    /// `preferSSL`
    #[serde(rename = "preferSSL")]
    Prefer,
    /// `requireSSL`
    #[serde(rename = "requireSSL")]
    Require,
}

impl TlsMode {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Allow => "allowSSL",
            Self::Prefer => "preferSSL",
            Self::Require => "requireSSL",
        }
    }
}

/// Extra `args2_6` settings requested for a resource, with the ones requested last time.
///
/// `desired` is deep-merged into the processes' arguments. Keys present in `previous` but
/// gone from `desired` are removed from the deployment's processes on merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdditionalConfig {
    /// Settings to apply
    pub desired: Object,
    /// Settings applied by the last merge
    pub previous: Object,
}

impl AdditionalConfig {
    #[must_use]
    pub fn new(desired: Object, previous: Object) -> Self {
        Self { desired, previous }
    }

    /// Neither side carries settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.desired.is_empty() && self.previous.is_empty()
    }
}

/// Lens over one `processes[]` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Process<O = Object>(O);

impl Process {
    /// Build a `mongod` process with the operator defaults (port, db path, log path).
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::DeploymentError::InvalidVersion`] if `version` is not a
    /// MongoDB version.
    pub fn new_mongod(
        name: &str,
        hostname: &str,
        version: &str,
        feature_compatibility_version: Option<&str>,
    ) -> Result<Self> {
        let mut process = Self::with_defaults(
            name,
            hostname,
            version,
            feature_compatibility_version,
            ProcessType::Mongod,
        )?;
        process.set_db_path(DEFAULT_DB_PATH)?;
        process.set_log_path(DEFAULT_LOG_PATH)?;
        Ok(process)
    }

    /// Build a `mongos` process with the operator defaults (port, log path).
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::DeploymentError::InvalidVersion`] if `version` is not a
    /// MongoDB version.
    pub fn new_mongos(
        name: &str,
        hostname: &str,
        version: &str,
        feature_compatibility_version: Option<&str>,
    ) -> Result<Self> {
        let mut process = Self::with_defaults(
            name,
            hostname,
            version,
            feature_compatibility_version,
            ProcessType::Mongos,
        )?;
        process.set_log_path(DEFAULT_LOG_PATH)?;
        Ok(process)
    }

    fn with_defaults(
        name: &str,
        hostname: &str,
        version: &str,
        feature_compatibility_version: Option<&str>,
        process_type: ProcessType,
    ) -> Result<Self> {
        let fcv = match feature_compatibility_version {
            Some(fcv) => Some(fcv.to_string()),
            None => default_feature_compatibility_version(version)?,
        };

        let mut obj = Object::new();
        obj.insert("version".into(), json!(version));
        obj.insert(
            "authSchemaVersion".into(),
            json!(auth_schema_version(version)?),
        );
        if let Some(fcv) = fcv {
            obj.insert("featureCompatibilityVersion".into(), json!(fcv));
        }
        obj.insert("processType".into(), json!(process_type.as_str()));
        obj.insert("name".into(), json!(name));
        obj.insert("hostname".into(), json!(hostname));

        let mut process = Self(obj);
        process.net_mut()?.insert("port".into(), json!(DEFAULT_MONGODB_PORT));
        Ok(process)
    }

    /// Wrap an existing object, e.g. one decoded from Ops Manager.
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

impl<'a> ProcessView<'a> {
    pub(crate) fn view(obj: &'a Object) -> Self {
        Self(obj)
    }
}

impl<'a> ProcessViewMut<'a> {
    pub(crate) fn view_mut(obj: &'a mut Object) -> Self {
        Self(obj)
    }
}

impl<O: Borrow<Object>> Process<O> {
    /// The underlying JSON object.
    pub fn object(&self) -> &Object {
        self.0.borrow()
    }

    /// Read-only lens over the same object.
    pub fn as_view(&self) -> ProcessView<'_> {
        Process(self.object())
    }

    /// Process name (identity key).
    ///
    /// # Errors
    ///
    /// Structural error if `name` is absent or not a string.
    pub fn name(&self) -> Result<&str> {
        require_str(self.object(), "name", "process")
    }

    /// Hostname the automation agent runs on.
    ///
    /// # Errors
    ///
    /// Structural error if `hostname` is absent or not a string.
    pub fn hostname(&self) -> Result<&str> {
        require_str(self.object(), "hostname", &self.ctx())
    }

    /// MongoDB version of the process.
    ///
    /// # Errors
    ///
    /// Structural error if `version` is absent or not a string.
    pub fn version(&self) -> Result<&str> {
        require_str(self.object(), "version", &self.ctx())
    }

    /// `mongod` or `mongos`.
    ///
    /// # Errors
    ///
    /// Structural error if `processType` is absent or not one of the two known values.
    pub fn process_type(&self) -> Result<ProcessType> {
        let obj = self.object();
        match require_str(obj, "processType", &self.ctx())? {
            "mongod" => Ok(ProcessType::Mongod),
            "mongos" => Ok(ProcessType::Mongos),
            _ => Err(structure_error(
                format!("{}.processType", self.ctx()),
                "\"mongod\" or \"mongos\"",
                obj.get("processType").unwrap_or(&Value::Null),
            )),
        }
    }

    /// `featureCompatibilityVersion`, if set.
    ///
    /// # Errors
    ///
    /// Structural error if present but not a string.
    pub fn feature_compatibility_version(&self) -> Result<Option<&str>> {
        get_str(self.object(), "featureCompatibilityVersion", &self.ctx())
    }

    /// `authSchemaVersion`, if set.
    ///
    /// # Errors
    ///
    /// Structural error if present but not an integer.
    pub fn auth_schema_version(&self) -> Result<Option<i64>> {
        get_integer(self.object(), "authSchemaVersion", &self.ctx())
    }

    /// Name of the sharded cluster a mongos belongs to.
    ///
    /// # Errors
    ///
    /// Structural error if present but not a string.
    pub fn cluster(&self) -> Result<Option<&str>> {
        get_str(self.object(), "cluster", &self.ctx())
    }

    /// `alias`, an Ops Manager display name.
    ///
    /// # Errors
    ///
    /// Structural error if present but not a string.
    pub fn alias(&self) -> Result<Option<&str>> {
        get_str(self.object(), "alias", &self.ctx())
    }

    /// Whether Ops Manager has the process disabled.
    ///
    /// # Errors
    ///
    /// Structural error if present but not a boolean.
    pub fn is_disabled(&self) -> Result<bool> {
        Ok(get_bool(self.object(), "disabled", &self.ctx())?.unwrap_or(false))
    }

    /// The `args2_6` startup options, if present.
    ///
    /// # Errors
    ///
    /// Structural error if present but not an object.
    pub fn args(&self) -> Result<Option<&Object>> {
        get_object(self.object(), ARGS_KEY, &self.ctx())
    }

    /// `args2_6.replication.replSetName`.
    ///
    /// # Errors
    ///
    /// Structural error if an intermediate level is not an object or the value is not a string.
    pub fn replica_set_name(&self) -> Result<Option<&str>> {
        self.args_str(&["replication", "replSetName"])
    }

    /// `args2_6.storage.dbPath`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn db_path(&self) -> Result<Option<&str>> {
        self.args_str(&["storage", "dbPath"])
    }

    /// `args2_6.systemLog.path`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn log_path(&self) -> Result<Option<&str>> {
        self.args_str(&["systemLog", "path"])
    }

    /// `args2_6.net.port`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn port(&self) -> Result<Option<i64>> {
        match self.args()? {
            Some(args) => match get_object(args, "net", &self.args_ctx())? {
                Some(net) => get_integer(net, "port", &format!("{}.net", self.args_ctx())),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// `args2_6.storage.wiredTiger.engineConfig.cacheSizeGB`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn wired_tiger_cache(&self) -> Result<Option<f64>> {
        let Some(args) = self.args()? else {
            return Ok(None);
        };
        let keys = ["storage", "wiredTiger", "engineConfig", "cacheSizeGB"];
        match get_path(args, &keys, &self.args_ctx())? {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(structure_error(
                format!("{}.{}", self.args_ctx(), keys.join(".")),
                "number",
                other,
            )),
        }
    }

    /// `args2_6.net.tls` (or the legacy `net.ssl`), if present.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn tls_config(&self) -> Result<Option<&Object>> {
        let Some(args) = self.args()? else {
            return Ok(None);
        };
        let ctx = format!("{}.net", self.args_ctx());
        match get_object(args, "net", &self.args_ctx())? {
            Some(net) => get_object(net, tls_key(net), &ctx),
            None => Ok(None),
        }
    }

    /// A process counts as TLS-enabled once it has a `PEMKeyFile` or `certificateKeyFile`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn is_tls_enabled(&self) -> Result<bool> {
        Ok(self.tls_config()?.is_some_and(|tls| {
            tls.contains_key("PEMKeyFile") || tls.contains_key("certificateKeyFile")
        }))
    }

    /// `args2_6.security.clusterAuthMode`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn cluster_auth_mode(&self) -> Result<Option<&str>> {
        self.args_str(&["security", "clusterAuthMode"])
    }

    /// Whether internal cluster authentication is configured.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn has_internal_cluster_authentication(&self) -> Result<bool> {
        Ok(self.cluster_auth_mode()?.is_some_and(|mode| !mode.is_empty()))
    }

    /// Whether the process runs as a config server (`sharding.clusterRole = configsvr`).
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn is_config_server(&self) -> Result<bool> {
        Ok(self.args_str(&["sharding", "clusterRole"])? == Some(CLUSTER_ROLE_CONFIG_SERVER))
    }

    fn args_str(&self, keys: &[&str]) -> Result<Option<&str>> {
        match self.args()? {
            Some(args) => get_path_str(args, keys, &self.args_ctx()),
            None => Ok(None),
        }
    }

    fn ctx(&self) -> String {
        match self.object().get("name") {
            Some(Value::String(name)) => format!("process '{name}'"),
            _ => "process".to_string(),
        }
    }

    fn args_ctx(&self) -> String {
        format!("{}.{ARGS_KEY}", self.ctx())
    }
}

impl<O: BorrowMut<Object>> Process<O> {
    fn object_mut(&mut self) -> &mut Object {
        self.0.borrow_mut()
    }

    /// `args2_6`, created when absent.
    ///
    /// # Errors
    ///
    /// Structural error if `args2_6` exists but is not an object.
    pub fn args_mut(&mut self) -> Result<&mut Object> {
        let ctx = self.ctx();
        read_or_create_map(self.object_mut(), ARGS_KEY, &ctx)
    }

    fn args_path_mut(&mut self, keys: &[&str]) -> Result<&mut Object> {
        let ctx = self.args_ctx();
        ensure_path(self.args_mut()?, keys, &ctx)
    }

    /// `args2_6.net`, created when absent.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn net_mut(&mut self) -> Result<&mut Object> {
        self.args_path_mut(&["net"])
    }

    /// TLS settings under `args2_6.net`, created as `tls` when the process has none.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn tls_config_mut(&mut self) -> Result<&mut Object> {
        let ctx = format!("{}.net", self.args_ctx());
        let net = self.net_mut()?;
        let key = tls_key(net);
        read_or_create_map(net, key, &ctx)
    }

    /// Deep-merge `args` into `args2_6`.
    ///
    /// # Errors
    ///
    /// Structural error if `args2_6` is not an object.
    pub fn merge_args(&mut self, args: &Object) -> Result<&mut Self> {
        merge_objects(self.args_mut()?, args);
        Ok(self)
    }

    /// Drop the `args2_6` keys `config.previous` set that `config.desired` no longer has.
    ///
    /// # Errors
    ///
    /// Structural error if `args2_6` is not an object.
    pub fn remove_dropped_args(&mut self, config: &AdditionalConfig) -> Result<&mut Self> {
        if !config.previous.is_empty() {
            remove_dropped_fields(self.args_mut()?, &config.desired, &config.previous);
        }
        Ok(self)
    }

    pub(crate) fn set_name(&mut self, name: &str) -> &mut Self {
        self.object_mut().insert("name".into(), json!(name));
        self
    }

    /// Set `args2_6.storage.dbPath`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn set_db_path(&mut self, db_path: &str) -> Result<&mut Self> {
        self.args_path_mut(&["storage"])?
            .insert("dbPath".into(), json!(db_path));
        Ok(self)
    }

    /// Set `args2_6.systemLog` to log into `log_path`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn set_log_path(&mut self, log_path: &str) -> Result<&mut Self> {
        let system_log = self.args_path_mut(&["systemLog"])?;
        system_log.insert("destination".into(), json!("file"));
        system_log.insert("path".into(), json!(log_path));
        Ok(self)
    }

    /// Set `args2_6.replication.replSetName`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn set_replica_set_name(&mut self, replica_set: &str) -> Result<&mut Self> {
        self.args_path_mut(&["replication"])?
            .insert("replSetName".into(), json!(replica_set));
        Ok(self)
    }

    /// Mark the process as a config server.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn set_cluster_role_config_server(&mut self) -> Result<&mut Self> {
        self.args_path_mut(&["sharding"])?
            .insert("clusterRole".into(), json!(CLUSTER_ROLE_CONFIG_SERVER));
        Ok(self)
    }

    /// Set the sharded cluster a mongos belongs to.
    pub fn set_cluster(&mut self, cluster: &str) -> &mut Self {
        self.object_mut().insert("cluster".into(), json!(cluster));
        self
    }

    /// Set the wiredTiger cache size. Ignored for mongos processes.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn set_wired_tiger_cache(&mut self, cache_size_gb: f64) -> Result<&mut Self> {
        if self.process_type()? != ProcessType::Mongod {
            return Ok(self);
        }
        self.args_path_mut(&["storage", "wiredTiger", "engineConfig"])?
            .insert("cacheSizeGB".into(), json!(cache_size_gb));
        Ok(self)
    }

    /// Set the Ops Manager `disabled` flag.
    pub fn set_disabled(&mut self, disabled: bool) -> &mut Self {
        self.object_mut().insert("disabled".into(), json!(disabled));
        self
    }

    /// Enable TLS with the given mode. `PEMKeyFile` is dropped for [`TlsMode::Disabled`].
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn configure_tls(&mut self, mode: TlsMode, pem_key_file: &str) -> Result<&mut Self> {
        let tls = self.tls_config_mut()?;
        tls.insert("mode".into(), json!(mode.as_str()));
        if mode == TlsMode::Disabled {
            tls.remove("PEMKeyFile");
        } else {
            tls.insert("PEMKeyFile".into(), json!(pem_key_file));
        }
        Ok(self)
    }

    /// Configure internal cluster authentication. Only `x509` (case-insensitive) is acted
    /// upon: it sets `security.clusterAuthMode` and a per-process `clusterFile`.
    ///
    /// # Errors
    ///
    /// Structural error on shape mismatch.
    pub fn configure_cluster_auth_mode(&mut self, mode: &str) -> Result<&mut Self> {
        if !mode.eq_ignore_ascii_case(X509_CLUSTER_AUTH_MODE) {
            return Ok(self);
        }
        let cluster_file = format!("{INTERNAL_CLUSTER_AUTH_MOUNT_PATH}{}-pem", self.name()?);
        self.args_path_mut(&["security"])?
            .insert("clusterAuthMode".into(), json!(X509_CLUSTER_AUTH_MODE));
        self.tls_config_mut()?
            .insert("clusterFile".into(), json!(cluster_file));
        Ok(self)
    }

    /// Overlay the operator-owned fields of `desired` onto this process.
    ///
    /// Owned fields: `name`, `hostname`, `version`, `processType`, `authSchemaVersion`,
    /// `featureCompatibilityVersion`, `cluster` (mongos) and every key `desired` sets under
    /// `args2_6`, which is deep-merged. Keys only the existing process has under `args2_6`
    /// stay, see [`Self::remove_dropped_args`] for dropping them. TLS settings are written
    /// under whichever of `net.tls` or `net.ssl` the process already uses, and removed when
    /// `desired` has no TLS mode. Everything else is untouched.
    ///
    /// # Errors
    ///
    /// Structural error if either side has an unexpected shape.
    pub fn merge_from<D: Borrow<Object>>(&mut self, desired: &Process<D>) -> Result<()> {
        if let Some(desired_args) = desired.args()? {
            let mut args = desired_args.clone();
            if let Some(Value::Object(net)) = args.get_mut("net") {
                net.remove(TLS_KEY);
                net.remove(SSL_KEY);
            }
            self.merge_args(&args)?;
        }

        if desired.process_type()? == ProcessType::Mongos {
            if let Some(cluster) = desired.cluster()? {
                self.set_cluster(cluster);
            }
        }

        let source = desired.object();
        let target = self.object_mut();
        for key in ["name", "hostname", "version", "processType", "authSchemaVersion"] {
            if let Some(value) = source.get(key) {
                target.insert(key.into(), value.clone());
            }
        }
        match source.get("featureCompatibilityVersion") {
            Some(fcv) if !fcv.is_null() => {
                target.insert("featureCompatibilityVersion".into(), fcv.clone());
            }
            _ => {
                target.remove("featureCompatibilityVersion");
            }
        }

        self.merge_tls_from(desired)
    }

    fn merge_tls_from<D: Borrow<Object>>(&mut self, desired: &Process<D>) -> Result<()> {
        let desired_tls = desired.tls_config()?.filter(|tls| tls.contains_key("mode"));
        match desired_tls {
            Some(desired_tls) => {
                let disabled = desired_tls.get("mode") == Some(&json!(TlsMode::Disabled.as_str()));
                let tls = self.tls_config_mut()?;
                for (key, value) in desired_tls {
                    tls.insert(key.clone(), value.clone());
                }
                if disabled {
                    tls.remove("PEMKeyFile");
                    tls.remove("certificateKeyFile");
                } else if tls.contains_key("certificateKeyFile") {
                    // newer agents read certificateKeyFile; both must not be set
                    tls.remove("PEMKeyFile");
                }
            }
            None => {
                let ctx = self.args_ctx();
                if let Some(args) = get_object_mut(self.object_mut(), ARGS_KEY, &ctx)? {
                    if let Some(net) = get_object_mut(args, "net", &ctx)? {
                        let key = tls_key(net);
                        net.remove(key);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Serialize for Process {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Process {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Object::deserialize(deserializer).map(Self)
    }
}

impl<O: Borrow<Object>> fmt::Display for Process<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.object();
        let field = |key: &str| obj.get(key).and_then(Value::as_str).unwrap_or("<unset>");
        write!(
            f,
            "\"{}\" (hostname: {}, version: {})",
            field("name"),
            field("hostname"),
            field("version")
        )
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod process_tests;
