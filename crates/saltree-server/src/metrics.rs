//! Prometheus metrics for the retrieval server
//!
//! Privacy-safe metrics: only route and outcome labels, never indices or
//! record content.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

pub const ROUTE_ROOT: &str = "root";
pub const ROUTE_OT: &str = "ot";
pub const ROUTE_OT_RECORD: &str = "ot_record";
pub const ROUTE_PIR: &str = "pir";
pub const ROUTE_INSERT: &str = "insert";
pub const ROUTE_TOMBSTONE: &str = "tombstone";
pub const ROUTE_SNAPSHOT: &str = "snapshot";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

pub fn record_request(route: &str, outcome: &str, duration: Duration) {
    counter!("saltree_requests_total", "route" => route.to_string(), "outcome" => outcome.to_string()).increment(1);
    histogram!("saltree_request_duration_seconds", "route" => route.to_string(), "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_mutation(kind: &str) {
    counter!("saltree_mutations_total", "kind" => kind.to_string()).increment(1);
}

pub fn set_tree_shape(leaves: u64, tombstones: u64, height: u64) {
    gauge!("saltree_tree_leaves").set(leaves as f64);
    gauge!("saltree_tree_tombstones").set(tombstones as f64);
    gauge!("saltree_tree_height").set(height as f64);
}

pub fn set_epoch(epoch: u64) {
    gauge!("saltree_commitment_epoch").set(epoch as f64);
}

pub fn record_snapshot(duration: Duration, bytes: usize) {
    histogram!("saltree_snapshot_duration_seconds").record(duration.as_secs_f64());
    gauge!("saltree_snapshot_bytes").set(bytes as f64);
}

pub fn init_prometheus_recorder(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()
}
