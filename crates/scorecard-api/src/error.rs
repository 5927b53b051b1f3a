//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use scorecard_gemini::GeminiError;
use scorecard_media::MediaError;
use scorecard_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gemini error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
                StorageError::InvalidName(_) | StorageError::InvalidUri(_) => StatusCode::BAD_REQUEST,
                StorageError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Gemini(GeminiError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Media(MediaError::InvalidVideo(_) | MediaError::InvalidParameter(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) | ApiError::Gemini(_) | ApiError::Media(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_models::VideoNameError;

    #[test]
    fn test_storage_status_mapping() {
        assert_eq!(
            ApiError::from(StorageError::not_found("videos/a.mp4")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::AlreadyExists("b.mp4".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::from(VideoNameError::Empty)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::ServerError(503, "busy".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unavailable_capabilities() {
        assert_eq!(
            ApiError::service_unavailable("storage").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(GeminiError::not_configured("no key")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
