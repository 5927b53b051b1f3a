//! Media errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// `ffmpeg` or `ffprobe` is not on `PATH`.
    #[error("{0} not found in PATH")]
    ToolMissing(&'static str),

    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: &'static str,
        message: String,
        /// Tail of the tool's stderr.
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable ffprobe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Output file is empty or missing: {0}")]
    EmptyOutput(PathBuf),
}

impl MediaError {
    pub fn tool_failed(
        tool: &'static str,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
