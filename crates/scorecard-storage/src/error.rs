//! Storage error types.

use scorecard_models::VideoNameError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Default back-off when a 429 carries no Retry-After header.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Errors that can occur during Cloud Storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid storage URI: {0}")]
    InvalidUri(String),

    #[error("Invalid video name: {0}")]
    InvalidName(#[from] VideoNameError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_uri(uri: impl Into<String>) -> Self {
        Self::InvalidUri(uri.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        Self::from_http_response(status, message, None)
    }

    /// Map a non-success HTTP status, keeping the Retry-After hint for 429.
    pub fn from_http_response(status: u16, message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::RateLimited(retry_after_ms.unwrap_or(DEFAULT_RATE_LIMIT_MS)),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StorageError::AuthError(_) => Some(401),
            StorageError::PermissionDenied(_) => Some(403),
            StorageError::NotFound(_) => Some(404),
            StorageError::AlreadyExists(_) => Some(409),
            StorageError::RateLimited(_) => Some(429),
            StorageError::ServerError(status, _) => Some(*status),
            StorageError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Network(e) => !e.is_builder() && !e.is_decode(),
            StorageError::RateLimited(_) | StorageError::ServerError(..) => true,
            _ => false,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StorageError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
