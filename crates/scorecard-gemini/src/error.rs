//! Gemini error types.

use thiserror::Error;

pub type GeminiResult<T> = Result<T, GeminiError>;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini not configured: {0}")]
    NotConfigured(String),

    #[error("Gemini API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Gemini returned no content: {0}")]
    EmptyResponse(String),

    #[error("All Gemini models failed")]
    AllModelsFailed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeminiError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn empty_response(msg: impl Into<String>) -> Self {
        Self::EmptyResponse(msg.into())
    }

    /// True for rejected credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, GeminiError::Api { status: 401 | 403, .. })
            || matches!(self, GeminiError::Api { status: 400, message } if message.contains("API_KEY_INVALID"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors() {
        assert!(GeminiError::api(403, "forbidden").is_auth_error());
        assert!(GeminiError::api(400, "reason: API_KEY_INVALID").is_auth_error());
        assert!(!GeminiError::api(400, "bad request").is_auth_error());
        assert!(!GeminiError::empty_response("blocked").is_auth_error());
    }
}
