//! Stored video models and naming rules.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extensions accepted for upload and listed from storage.
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mpeg4"];

/// A video stored in the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoObject {
    /// File name without the `videos/` prefix
    pub name: String,

    /// `gs://bucket/videos/name`
    pub gcs_uri: String,

    /// `https://storage.googleapis.com/bucket/videos/name`
    pub public_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl VideoObject {
    /// Size formatted in megabytes, e.g. `"12.34 MB"`.
    pub fn size_display(&self) -> String {
        match self.size_bytes {
            Some(bytes) => format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)),
            None => "Unknown".to_string(),
        }
    }

    /// Upload time formatted as `YYYY-MM-DD HH:MM:SS`.
    pub fn uploaded_display(&self) -> String {
        self.uploaded_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoNameError {
    #[error("Video name is empty")]
    Empty,

    #[error("Video name contains invalid characters: {0}")]
    InvalidCharacters(String),

    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),
}

/// Reduce a client-supplied name to a safe object file name.
///
/// Directory components are dropped; traversal and control characters are rejected.
pub fn sanitize_video_name(name: &str) -> Result<String, VideoNameError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." {
        return Err(VideoNameError::Empty);
    }
    if base == ".." || base.chars().any(|c| c.is_control()) {
        return Err(VideoNameError::InvalidCharacters(name.to_string()));
    }

    Ok(base.to_string())
}

/// Lowercased extension of a file name.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn is_supported_video(name: &str) -> bool {
    extension_of(name)
        .map(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type used for uploads and inline model payloads.
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mp4") | Some("mpeg4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
