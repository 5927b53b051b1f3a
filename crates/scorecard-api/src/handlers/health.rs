//! Liveness and readiness probes.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::handlers::index::APP_TITLE;
use crate::state::AppState;

/// Process is up. Never touches external services.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": APP_TITLE,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    Error,
    /// The capability was never configured.
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub status: CheckState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Check {
    const DISABLED: Check = Check {
        status: CheckState::Disabled,
        error: None,
        latency_ms: None,
    };

    async fn run<F, E>(probe: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        let start = Instant::now();
        match probe.await {
            Ok(()) => Self {
                status: CheckState::Ok,
                error: None,
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(e) => Self {
                status: CheckState::Error,
                error: Some(e.to_string()),
                latency_ms: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub storage: Check,
    pub gemini: Check,
}

/// Bucket reachable and primary Gemini model available.
///
/// A missing capability counts as degraded: the app still serves
/// rule-based results, but the deployment is not what was intended.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let storage = match &state.library {
        Some(library) => Check::run(library.client().check_connectivity()).await,
        None => Check::DISABLED,
    };
    let gemini = match &state.gemini {
        Some(client) => Check::run(client.check_model()).await,
        None => Check::DISABLED,
    };

    let ready = storage.status == CheckState::Ok && gemini.status == CheckState::Ok;
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "degraded" },
            checks: ReadinessChecks { storage, gemini },
        }),
    )
}
