//! Capability status.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    /// Gemini analysis available
    pub gemini: bool,
    /// Cloud Storage available
    pub google_cloud: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_upload_size_mb: usize,
    pub inline_video_limit_mb: u64,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        gemini: state.gemini.is_some(),
        google_cloud: state.library.is_some(),
        bucket: state.library.as_ref().map(|l| l.client().bucket().to_string()),
        model: state
            .gemini
            .as_ref()
            .map(|g| g.config().primary_model().to_string()),
        max_upload_size_mb: state.config.max_upload_size / (1024 * 1024),
        inline_video_limit_mb: state.config.inline_video_limit / (1024 * 1024),
    })
}
