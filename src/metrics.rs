// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the automation-config merge engine.
//!
//! All metrics carry the namespace prefix `om_deployment_`.
//!
//! # Metrics Categories
//!
//! - **Operation Metrics** - Merges and removals on a deployment, with outcome and duration
//! - **Removal Metrics** - Entities dropped from a deployment, for deregistration audits
//! - **Ops Manager Metrics** - Automation config requests and pushes
//!
//! # Example
//!
//! ```rust,no_run
//! use om_deployment::metrics::{gather_metrics, record_removed};
//!
//! record_removed("process", 2);
//! let text = gather_metrics().unwrap_or_default();
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

use crate::errors::DeploymentError;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "om_deployment";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Operation Metrics
// ============================================================================

/// Total number of deployment operations by operation and outcome
///
/// Labels:
/// - `operation`: e.g. `merge_replica_set`, `remove_sharded_cluster`
/// - `outcome`: `success` or the error kind (`structure`, `dangling_reference`, ...)
pub static OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_operations_total"),
        "Total number of deployment operations by operation and outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of deployment operations in seconds
///
/// Labels:
/// - `operation`: e.g. `merge_standalone`
pub static OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_operation_duration_seconds"),
        "Duration of deployment operations in seconds by operation",
    )
    .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Removal Metrics
// ============================================================================

/// Total number of entities removed from deployments
///
/// Labels:
/// - `kind`: `process`, `replica_set`, `sharded_cluster`, `shard`
pub static REMOVED_ENTITIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_removed_entities_total"),
        "Total number of entities removed from deployments by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Ops Manager Metrics
// ============================================================================

/// Total number of automation config requests sent to Ops Manager
///
/// Labels:
/// - `method`: `GET` or `PUT`
/// - `status`: HTTP status code, or `transport` when no response arrived
pub static OPS_MANAGER_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ops_manager_requests_total"),
        "Total number of automation config requests by method and status",
    );
    let counter = CounterVec::new(opts, &["method", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of read-modify-write cycles by outcome
///
/// Labels:
/// - `outcome`: `pushed`, `unchanged` or `error`
pub static DOCUMENT_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_document_updates_total"),
        "Total number of automation config read-modify-write cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome and duration of a deployment operation
///
/// # Arguments
/// * `operation` - Operation name (e.g., `merge_replica_set`)
/// * `duration` - Time spent in the operation
/// * `error` - The error, if the operation failed
pub fn record_operation(operation: &str, duration: Duration, error: Option<&DeploymentError>) {
    let outcome = error.map_or("success", DeploymentError::kind);
    OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record removed entities. Zero counts are ignored.
#[allow(clippy::cast_precision_loss)]
pub fn record_removed(kind: &str, count: usize) {
    if count > 0 {
        REMOVED_ENTITIES_TOTAL
            .with_label_values(&[kind])
            .inc_by(count as f64);
    }
}

/// Record an Ops Manager request
///
/// # Arguments
/// * `method` - HTTP method
/// * `status` - Status code as text, or `transport`
pub fn record_request(method: &str, status: &str) {
    OPS_MANAGER_REQUESTS_TOTAL
        .with_label_values(&[method, status])
        .inc();
}

/// Record the outcome of a read-modify-write cycle (`pushed`, `unchanged`, `error`)
pub fn record_document_update(outcome: &str) {
    DOCUMENT_UPDATES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
