//! Cloud Storage request metrics.

use metrics::{counter, histogram};

pub const GCS_REQUESTS_TOTAL: &str = "scorecard_gcs_requests_total";
pub const GCS_REQUEST_DURATION_SECONDS: &str = "scorecard_gcs_request_duration_seconds";
pub const GCS_RETRIES_TOTAL: &str = "scorecard_gcs_retries_total";

/// Count a finished JSON-API call and its latency.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    let operation = operation.to_string();
    counter!(GCS_REQUESTS_TOTAL, "operation" => operation.clone(), "status" => status.to_string()).increment(1);
    histogram!(GCS_REQUEST_DURATION_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &str) {
    counter!(GCS_RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}
