//! Multipart upload forms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use scorecard_models::{is_supported_video, sanitize_video_name};

use crate::error::{ApiError, ApiResult};

/// Video written to scratch space.
#[derive(Debug)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// Parsed multipart form. The file lives as long as the form.
///
/// A repeated text field keeps its last value, so a checkbox can follow a
/// hidden `false` input of the same name.
#[derive(Debug)]
pub struct UploadForm {
    _dir: TempDir,
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.field(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "on" | "yes"))
    }

    /// The uploaded file, or 400 when the form had none.
    pub fn require_file(&self) -> ApiResult<&UploadedFile> {
        self.file
            .as_ref()
            .ok_or_else(|| ApiError::bad_request("No video file provided"))
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Stream `file_field` to disk under `work_dir`; other fields are kept as text.
pub async fn read_upload_form(mut multipart: Multipart, work_dir: &Path, file_field: &str) -> ApiResult<UploadForm> {
    tokio::fs::create_dir_all(work_dir).await?;
    let dir = tempfile::Builder::new().prefix("upload-").tempdir_in(work_dir)?;

    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name != file_field {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
            continue;
        }

        let file_name = sanitize_video_name(field.file_name().unwrap_or_default())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if !is_supported_video(&file_name) {
            return Err(ApiError::bad_request(format!(
                "Unsupported video format: {}. Use MP4, MOV, AVI or MPEG4",
                file_name
            )));
        }

        let path = dir.path().join(&file_name);
        let mut out = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            out.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        out.flush().await?;

        if size == 0 {
            return Err(ApiError::bad_request("Uploaded video is empty"));
        }

        debug!(file = %file_name, bytes = size, "Received upload");
        file = Some(UploadedFile { path, file_name, size });
    }

    Ok(UploadForm { _dir: dir, file, fields })
}
