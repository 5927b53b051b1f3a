//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "scorecard_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "scorecard_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "scorecard_http_requests_in_flight";

    // Analysis metrics
    pub const ANALYSES_TOTAL: &str = "scorecard_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "scorecard_analysis_duration_seconds";

    // Video metrics
    pub const VIDEO_UPLOADS_TOTAL: &str = "scorecard_video_uploads_total";
    pub const VIDEO_UPLOAD_BYTES: &str = "scorecard_video_upload_bytes";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "scorecard_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished analysis by the path that produced it.
pub fn record_analysis(source: &str, duration_secs: f64) {
    let labels = [("source", source.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_video_upload(bytes: u64) {
    counter!(names::VIDEO_UPLOADS_TOTAL).increment(1);
    histogram!(names::VIDEO_UPLOAD_BYTES).record(bytes as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static VIDEO_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/videos/[^/]+").expect("video path pattern is valid"));

/// Sanitize path for metrics labels (video names become `:name`).
fn sanitize_path(path: &str) -> String {
    VIDEO_NAME.replace_all(path, "/videos/:name").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
