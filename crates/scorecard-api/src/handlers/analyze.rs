//! Upload-and-analyze handler.

use axum::extract::{Multipart, State};
use axum::Json;

use scorecard_models::{AnalysisRequest, GameContext, PitchType};

use crate::error::{ApiError, ApiResult};
use crate::handlers::form::{read_upload_form, UploadForm};
use crate::handlers::videos::AnalysisResponse;
use crate::metrics;
use crate::services::VideoSource;
use crate::state::AppState;

const DEFAULT_PITCHER: &str = "Amateur";

fn analysis_request(form: &UploadForm) -> ApiResult<AnalysisRequest> {
    let pitch_type = form
        .field("pitch_type")
        .map(str::parse::<PitchType>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?
        .unwrap_or_default();

    let game_context = form
        .field("game_context")
        .map(str::parse::<GameContext>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?
        .unwrap_or_default();

    let pitcher = form.field("pitcher").unwrap_or(DEFAULT_PITCHER);

    Ok(AnalysisRequest::new(pitcher, pitch_type, game_context)
        .with_slow_motion(form.flag("slow_motion").unwrap_or(true)))
}

/// Upload a clip and analyze it.
///
/// Multipart fields: `video` (file), `pitcher`, `pitch_type`,
/// `game_context`, `slow_motion`.
pub async fn analyze_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalysisResponse>> {
    let form = read_upload_form(multipart, &state.config.work_dir, "video").await?;
    let request = analysis_request(&form)?;
    let file = form.require_file()?;
    metrics::record_video_upload(file.size);

    let outcome = state
        .analyzer
        .analyze(
            request.clone(),
            VideoSource::Upload {
                path: file.path.clone(),
                file_name: file.file_name.clone(),
            },
        )
        .await;

    Ok(Json(AnalysisResponse { request, outcome }))
}
