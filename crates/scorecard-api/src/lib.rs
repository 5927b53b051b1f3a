//! Axum HTTP server for the Pitcher Scorecard.
//!
//! This crate provides:
//! - Video library CRUD on Cloud Storage
//! - Upload-and-analyze with Gemini and a rule-based fallback
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use handlers::APP_TITLE;
pub use routes::create_router;
pub use services::{MechanicsAnalyzer, VideoSource};
pub use state::AppState;
