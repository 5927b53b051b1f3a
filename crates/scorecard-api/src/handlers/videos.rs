//! Video library handlers.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use scorecard_models::{content_type_for, AnalysisOutcome, AnalysisRequest, VideoObject};
use scorecard_storage::VideoLibrary;

use crate::error::{ApiError, ApiResult};
use crate::handlers::form::read_upload_form;
use crate::metrics;
use crate::services::VideoSource;
use crate::state::AppState;

/// Stored video plus display strings.
#[derive(Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: VideoObject,
    pub size: String,
    pub uploaded: String,
}

impl From<VideoObject> for VideoResponse {
    fn from(video: VideoObject) -> Self {
        Self {
            size: video.size_display(),
            uploaded: video.uploaded_display(),
            video,
        }
    }
}

#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub new_name: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub request: AnalysisRequest,
    pub outcome: AnalysisOutcome,
}

pub(crate) fn library(state: &AppState) -> ApiResult<&VideoLibrary> {
    state
        .library
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Google Cloud Storage is not configured"))
}

/// List stored videos.
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<VideoListResponse>> {
    let videos: Vec<VideoResponse> = library(&state)?
        .list()
        .await?
        .into_iter()
        .map(VideoResponse::from)
        .collect();

    Ok(Json(VideoListResponse {
        count: videos.len(),
        videos,
    }))
}

/// Upload a video (multipart field `video`).
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<VideoResponse>)> {
    let library = library(&state)?;
    let form = read_upload_form(multipart, &state.config.work_dir, "video").await?;
    let file = form.require_file()?;

    let video = library.upload(&file.path, &file.file_name).await?;
    metrics::record_video_upload(file.size);

    Ok((StatusCode::CREATED, Json(video.into())))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let video = library(&state)?.info(&name).await?;
    Ok(Json(video.into()))
}

/// Stream the stored clip back for playback.
pub async fn get_video_content(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let bytes = library(&state)?.content(&name).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(e.to_string()))
}

pub async fn rename_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Json<VideoResponse>> {
    let video = library(&state)?.rename(&name, &body.new_name).await?;
    Ok(Json(video.into()))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    library(&state)?.delete(&name).await?;
    Ok(Json(DeleteResponse { deleted: 1 }))
}

pub async fn delete_all_videos(State(state): State<AppState>) -> ApiResult<Json<DeleteResponse>> {
    let deleted = library(&state)?.delete_all().await?;
    info!(deleted, "Cleared video library");
    Ok(Json(DeleteResponse { deleted }))
}

/// Analyze a video that is already stored.
pub async fn analyze_stored_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    if request.pitcher_name.trim().is_empty() {
        return Err(ApiError::bad_request("pitcher_name is required"));
    }

    let outcome = state
        .analyzer
        .analyze(request.clone(), VideoSource::Stored { name_or_uri: name })
        .await;

    Ok(Json(AnalysisResponse { request, outcome }))
}
