//! Deployment error types.

use thiserror::Error;

pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Missing configuration: {0}")]
    NotConfigured(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid commit identifier: {0:?}")]
    InvalidCommit(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} exited with status {}: {stderr}", exit_status(.exit_code))]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{step} timed out after {secs} seconds")]
    Timeout { step: String, secs: u64 },

    #[error("No service URL in describe output: {0:?}")]
    MissingServiceUrl(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())
}

impl DeployError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn verification_failed(msg: impl Into<String>) -> Self {
        Self::VerificationFailed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
