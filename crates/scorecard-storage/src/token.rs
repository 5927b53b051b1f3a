//! Access tokens for the Cloud Storage JSON API.
//!
//! Service-account tokens are cached with:
//! - Refresh margin to avoid token expiry during requests
//! - Single-flight refresh so concurrent requests share one token fetch
//! - Fallback to the existing token while it is still usable

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Refresh tokens 60 seconds before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the expiry cannot be read (50 minutes).
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for reading and writing bucket objects.
pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Something that can authorize Cloud Storage requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Bearer token for the next request; `None` sends the request unauthenticated.
    async fn access_token(&self) -> StorageResult<Option<String>>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// A fixed token, or none at all. Used against emulators and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> StorageResult<Option<String>> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Still valid once the refresh margin is accounted for.
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Past the refresh margin but not yet expired.
    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Service-account tokens with caching.
pub struct ServiceAccountTokens {
    auth: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            cache: RwLock::new(None),
        }
    }

    /// Load the service-account key file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            StorageError::auth_error(format!(
                "Failed to load service account from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::new(Arc::new(account)))
    }

    /// Load the key file named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> StorageResult<Self> {
        let account = CustomServiceAccount::from_env()
            .map_err(|e| StorageError::auth_error(format!("Failed to load service account: {}", e)))?;

        match account {
            Some(sa) => Ok(Self::new(Arc::new(sa))),
            None => Err(StorageError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    async fn refresh_token(&self, cache: &mut Option<CachedToken>) -> StorageResult<String> {
        match self.auth.token(&[STORAGE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();

                let expires_at = {
                    let now = Utc::now();
                    let exp = token.expires_at();
                    if exp > now {
                        match (exp - now).to_std() {
                            Ok(ttl) => Instant::now() + ttl,
                            Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                        }
                    } else {
                        Instant::now()
                    }
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed storage auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }

                Err(StorageError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> StorageResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(Some(cached.access_token.clone()));
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(Some(cached.access_token.clone()));
            }
        }

        self.refresh_token(&mut cache).await.map(Some)
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_constants() {
        assert_eq!(TOKEN_REFRESH_MARGIN, Duration::from_secs(60));
        assert_eq!(TOKEN_DEFAULT_TTL, Duration::from_secs(50 * 60));
        assert!(STORAGE_SCOPE.contains("devstorage"));
    }

    #[test]
    fn test_cached_token_margin() {
        let fresh = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_valid());

        let closing = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!closing.is_valid());
        assert!(closing.is_usable());
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(
            StaticToken::new("abc").access_token().await.unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(StaticToken::anonymous().access_token().await.unwrap(), None);
    }

    #[test]
    fn test_missing_key_file() {
        let err = ServiceAccountTokens::from_file("/nonexistent/key.json").err().unwrap();
        assert!(matches!(err, StorageError::AuthError(_)));
    }
}
