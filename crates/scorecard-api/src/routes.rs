//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    analyze_stored_video, analyze_upload, delete_all_videos, delete_video, get_video, get_video_content, health,
    index, list_videos, ready, rename_video, status, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, ClientRateLimiter};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route(
            "/videos",
            get(list_videos).post(upload_video).delete(delete_all_videos),
        )
        .route(
            "/videos/:name",
            get(get_video).patch(rename_video).delete(delete_video),
        )
        .route("/videos/:name/content", get(get_video_content))
        .route("/videos/:name/analyze", post(analyze_stored_video));

    let analysis_routes = Router::new()
        .route("/analyze", post(analyze_upload))
        .route("/status", get(status));

    let rate_limiter = ClientRateLimiter::new(state.config.rate_limit_rps, state.config.rate_limit_burst);

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(analysis_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/", get(index))
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit, not axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
