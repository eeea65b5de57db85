// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the automation-config merge engine.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Document Keys
// ============================================================================

/// Top-level array of process entries
pub const PROCESSES_KEY: &str = "processes";

/// Top-level array of replica set entries
pub const REPLICA_SETS_KEY: &str = "replicaSets";

/// Top-level array of sharded cluster entries
pub const SHARDING_KEY: &str = "sharding";

/// Top-level array of monitoring agent configs
pub const MONITORING_VERSIONS_KEY: &str = "monitoringVersions";

/// Top-level array of backup agent configs
pub const BACKUP_VERSIONS_KEY: &str = "backupVersions";

/// Legacy name of the TLS settings, kept on documents that still use it
pub const SSL_KEY: &str = "ssl";

/// TLS settings, top level and under `args2_6.net`
pub const TLS_KEY: &str = "tls";

/// Process startup options key
pub const ARGS_KEY: &str = "args2_6";

// ============================================================================
// Process Defaults
// ============================================================================

/// Port used by every mongod/mongos (each runs in its own container)
pub const DEFAULT_MONGODB_PORT: u16 = 27017;

/// Data directory of mongod processes
pub const DEFAULT_DB_PATH: &str = "/data";

/// Log file shared with the automation, monitoring and backup agents
pub const DEFAULT_LOG_PATH: &str = "/var/log/mongodb-mms-automation/mongodb.log";

/// PEM key file mounted into database containers
pub const PEM_KEY_FILE_PATH_IN_CONTAINER: &str = "/mongodb-automation/server.pem";

/// CA file mounted into database containers
pub const CA_FILE_PATH_IN_CONTAINER: &str = "/mongodb-automation/ca.pem";

/// Directory holding per-process internal cluster authentication certificates
pub const INTERNAL_CLUSTER_AUTH_MOUNT_PATH: &str = "/mongodb-automation/cluster-auth/";

/// Ops Manager value of `security.clusterAuthMode` for certificate-based auth
pub const X509_CLUSTER_AUTH_MODE: &str = "x509";

/// `sharding.clusterRole` of config server processes
pub const CLUSTER_ROLE_CONFIG_SERVER: &str = "configsvr";

/// Default `tls.clientCertificateMode` of a new deployment
pub const CLIENT_CERTIFICATE_MODE_OPTIONAL: &str = "OPTIONAL";

// ============================================================================
// Replica Set Limits
// ============================================================================

/// Maximum number of voting members MongoDB allows in a replica set
pub const MAX_VOTING_MEMBERS: usize = 7;

// ============================================================================
// Agent Versions
// ============================================================================

/// Monitoring agent version written for new agents (the automation agent upgrades it)
pub const MONITORING_AGENT_DEFAULT_VERSION: &str = "6.4.0.433-1";

/// Backup agent version written for new agents (the automation agent upgrades it)
pub const BACKUP_AGENT_DEFAULT_VERSION: &str = "6.6.0.959-1";

// ============================================================================
// Naming Conventions
// ============================================================================

/// Suffix of the config server replica set of a sharded cluster
pub const CONFIG_SERVER_SUFFIX: &str = "config";

/// Infix of mongos process names of a sharded cluster
pub const MONGOS_INFIX: &str = "mongos";

// ============================================================================
// Ops Manager API
// ============================================================================

/// Path of the automation config endpoint, relative to the Ops Manager base URL
pub const AUTOMATION_CONFIG_PATH_TEMPLATE: &str = "api/public/v1.0/groups/{project_id}/automationConfig";

/// HTTP request timeout for Ops Manager API calls (seconds)
pub const OPS_MANAGER_REQUEST_TIMEOUT_SECS: u64 = 30;
