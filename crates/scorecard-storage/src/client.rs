//! Cloud Storage JSON API client.
//!
//! - Cached service-account tokens (see [`crate::token`])
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Tracing spans and request metrics

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, Instrument};

use crate::error::{StorageError, StorageResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token::{ServiceAccountTokens, StaticToken, TokenSource};
use crate::uri::GcsUri;

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";
const DEFAULT_LOCATION: &str = "US-CENTRAL1";

/// Cloud Storage client configuration.
#[derive(Debug, Clone)]
pub struct GcsConfig {
    /// Project that owns the bucket; needed only to create it.
    pub project_id: Option<String>,
    pub bucket: String,
    /// Location used when the bucket has to be created.
    pub location: String,
    /// API root, overridable for emulators.
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl GcsConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            project_id: None,
            bucket: bucket.into(),
            location: DEFAULT_LOCATION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let bucket = non_empty_env("GCP_BUCKET_NAME")
            .or_else(|| non_empty_env("GCS_BUCKET"))
            .ok_or_else(|| StorageError::not_configured("GCP_BUCKET_NAME or GCS_BUCKET must be set"))?;

        let project_id = non_empty_env("GCP_PROJECT_ID").or_else(|| non_empty_env("GOOGLE_CLOUD_PROJECT"));

        let timeout_secs: u64 = std::env::var("GCS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let connect_timeout_secs: u64 = std::env::var("GCS_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            project_id,
            bucket,
            location: non_empty_env("GCP_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            base_url: non_empty_env("GCS_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }

    fn is_emulator(&self) -> bool {
        self.base_url != DEFAULT_BASE_URL
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Object resource as returned by the JSON API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    pub bucket: String,
    /// Size in bytes; the API encodes it as a string.
    #[serde(default, with = "size_as_string")]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl ObjectMetadata {
    pub fn uri(&self) -> GcsUri {
        GcsUri::new(&self.bucket, &self.name)
    }
}

mod size_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&v.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<ObjectMetadata>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateBucketRequest<'a> {
    name: &'a str,
    location: &'a str,
}

/// Cloud Storage JSON API client bound to one bucket.
#[derive(Clone)]
pub struct GcsClient {
    http: Client,
    config: GcsConfig,
    tokens: Arc<dyn TokenSource>,
}

impl GcsClient {
    pub fn new(config: GcsConfig, tokens: Arc<dyn TokenSource>) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("scorecard-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Network)?;

        Ok(Self { http, config, tokens })
    }

    /// Create from environment variables.
    ///
    /// Against an emulator (`GCS_BASE_URL`) without credentials, requests
    /// are sent unauthenticated.
    pub fn from_env() -> StorageResult<Self> {
        let config = GcsConfig::from_env()?;
        let tokens: Arc<dyn TokenSource> =
            if config.is_emulator() && std::env::var("GOOGLE_APPLICATION_CREDENTIALS").is_err() {
                Arc::new(StaticToken::anonymous())
            } else {
                Arc::new(ServiceAccountTokens::from_env()?)
            };
        Self::new(config, tokens)
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn config(&self) -> &GcsConfig {
        &self.config
    }

    /// URI of an object in this bucket.
    pub fn uri(&self, object: &str) -> GcsUri {
        GcsUri::new(&self.config.bucket, object)
    }

    fn bucket_url(&self) -> String {
        format!("{}/storage/v1/b/{}", self.config.base_url, self.config.bucket)
    }

    fn object_url(&self, object: &str) -> String {
        format!("{}/o/{}", self.bucket_url(), urlencoding::encode(object))
    }

    // =========================================================================
    // Bucket Operations
    // =========================================================================

    pub async fn bucket_exists(&self) -> StorageResult<bool> {
        let url = self.bucket_url();
        match self.execute("bucket_get", || self.http.get(&url)).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create the bucket in the configured location when it is missing.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        if self.bucket_exists().await? {
            debug!(bucket = %self.config.bucket, "Bucket exists");
            return Ok(());
        }

        let project = self.config.project_id.as_deref().ok_or_else(|| {
            StorageError::not_configured("GCP_PROJECT_ID is required to create the bucket")
        })?;

        let url = format!("{}/storage/v1/b", self.config.base_url);
        let body = CreateBucketRequest {
            name: &self.config.bucket,
            location: &self.config.location,
        };

        match self
            .execute("bucket_create", || {
                self.http.post(&url).query(&[("project", project)]).json(&body)
            })
            .await
        {
            Ok(_) | Err(StorageError::AlreadyExists(_)) => {
                info!(
                    bucket = %self.config.bucket,
                    location = %self.config.location,
                    "Created bucket"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Verify credentials and bucket access.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        if self.bucket_exists().await? {
            Ok(())
        } else {
            Err(StorageError::not_found(format!("bucket {}", self.config.bucket)))
        }
    }

    // =========================================================================
    // Object Operations
    // =========================================================================

    /// Upload a local file as `object`.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        object: &str,
        content_type: &str,
    ) -> StorageResult<ObjectMetadata> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        debug!(path = %path.display(), object, bytes = data.len(), "Uploading file");
        self.upload_bytes(data, object, content_type).await
    }

    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        object: &str,
        content_type: &str,
    ) -> StorageResult<ObjectMetadata> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.config.base_url, self.config.bucket
        );

        let response = self
            .execute("upload", || {
                self.http
                    .post(&url)
                    .query(&[("uploadType", "media"), ("name", object)])
                    .header(CONTENT_TYPE, content_type)
                    .body(data.clone())
            })
            .await?;

        Ok(response.json().await?)
    }

    /// All objects whose names start with `prefix`, following pagination.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectMetadata>> {
        let url = format!("{}/o", self.bucket_url());
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .execute("list", || {
                    let mut req = self.http.get(&url).query(&[("prefix", prefix)]);
                    if let Some(token) = &page_token {
                        req = req.query(&[("pageToken", token.as_str())]);
                    }
                    req
                })
                .await?;

            let page: ListObjectsResponse = response.json().await?;
            objects.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    pub async fn object_metadata(&self, object: &str) -> StorageResult<ObjectMetadata> {
        let url = self.object_url(object);
        let response = self.execute("metadata", || self.http.get(&url)).await?;
        Ok(response.json().await?)
    }

    pub async fn object_exists(&self, object: &str) -> StorageResult<bool> {
        match self.object_metadata(object).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stream an object's content into `dest`.
    pub async fn download_to_file(&self, object: &str, dest: impl AsRef<Path>) -> StorageResult<u64> {
        let dest = dest.as_ref();
        let url = self.object_url(object);
        let mut response = self
            .execute("download", || self.http.get(&url).query(&[("alt", "media")]))
            .await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(object, dest = %dest.display(), bytes = written, "Downloaded object");
        Ok(written)
    }

    pub async fn download_bytes(&self, object: &str) -> StorageResult<Vec<u8>> {
        let url = self.object_url(object);
        let response = self
            .execute("download", || self.http.get(&url).query(&[("alt", "media")]))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Server-side copy within the bucket.
    pub async fn copy_object(&self, source: &str, destination: &str) -> StorageResult<ObjectMetadata> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(source),
            self.config.bucket,
            urlencoding::encode(destination)
        );
        let response = self
            .execute("copy", || {
                self.http
                    .post(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .body("{}")
            })
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete_object(&self, object: &str) -> StorageResult<()> {
        let url = self.object_url(object);
        self.execute("delete", || self.http.delete(&url)).await?;
        Ok(())
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Send a request with auth, retry, tracing and metrics.
    async fn execute<F>(&self, operation: &str, build: F) -> StorageResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let span = info_span!("storage_request", operation = %operation, bucket = %self.config.bucket);

        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, || self.send_once(&build))
            .instrument(span)
            .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn send_once<F>(&self, build: &F) -> StorageResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut response = self.authorize(build()).await?.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            response = self.authorize(build()).await?.send().await?;
        }

        if response.status().is_success() {
            return Ok(response);
        }

        Err(Self::error_from_response(response).await)
    }

    async fn authorize(&self, request: RequestBuilder) -> StorageResult<RequestBuilder> {
        Ok(match self.tokens.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn error_from_response(response: Response) -> StorageError {
        let status = response.status();
        let url = response.url().path().to_string();
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();

        StorageError::from_http_response(
            status.as_u16(),
            format!("{} failed: {}", url, body),
            retry_after_ms,
        )
    }
}
