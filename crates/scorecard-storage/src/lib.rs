//! Google Cloud Storage access for pitching videos.
//!
//! This crate provides:
//! - A JSON API client with cached service-account tokens and retry
//! - `gs://` URI handling and public object URLs
//! - The video library: upload, list, rename and delete under `videos/`

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token;
pub mod uri;
pub mod videos;

pub use client::{GcsClient, GcsConfig, ObjectMetadata};
pub use error::{StorageError, StorageResult};
pub use retry::{RetryConfig, MAX_RETRIES, MAX_RETRY_WAIT_SECONDS, MIN_RETRY_WAIT_SECONDS};
pub use token::{ServiceAccountTokens, StaticToken, TokenSource, STORAGE_SCOPE};
pub use uri::GcsUri;
pub use videos::{VideoLibrary, VIDEO_PREFIX};
