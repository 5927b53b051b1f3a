//! Retry policy with exponential backoff and jitter.
//!
//! - Exponential backoff between a minimum and maximum wait
//! - Respects Retry-After on 429
//! - Only network errors, 429 and 5xx are retried

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::{StorageError, StorageResult};
use crate::metrics::record_retry;

/// Number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;
/// Shortest wait between attempts.
pub const MIN_RETRY_WAIT_SECONDS: u64 = 4;
/// Longest wait between attempts.
pub const MAX_RETRY_WAIT_SECONDS: u64 = 10;

/// Cap on server-provided Retry-After hints.
const MAX_RETRY_AFTER_MS: u64 = 60_000;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay_ms: MIN_RETRY_WAIT_SECONDS * 1000,
            max_delay_ms: MAX_RETRY_WAIT_SECONDS * 1000,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let max_retries: u32 = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_RETRIES);

        let min_wait: u64 = std::env::var("MIN_RETRY_WAIT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MIN_RETRY_WAIT_SECONDS);

        let max_wait: u64 = std::env::var("MAX_RETRY_WAIT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_RETRY_WAIT_SECONDS);

        Self {
            max_retries,
            base_delay_ms: min_wait * 1000,
            max_delay_ms: max_wait.max(min_wait) * 1000,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Execute an async operation with retry.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> StorageResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = StorageResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let span = info_span!("storage_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Storage operation failed, retrying: {}",
                    e
                );

                record_retry(operation);
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| StorageError::request_failed("Unknown error")))
}

/// Delay before the retry following `attempt` (0-based).
///
/// `base * 2^attempt` capped at the maximum, with jitter that never drops
/// below the base delay. A Retry-After hint wins when present.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after.min(MAX_RETRY_AFTER_MS));
    }

    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    let jittered = if capped_delay > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms.min(config.max_delay_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 4000);
        assert_eq!(config.max_delay_ms, 10000);
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(&config, 0, Some(2000)), Duration::from_millis(2000));
    }

    #[test]
    fn test_calculate_delay_bounds() {
        let config = RetryConfig::default();
        for attempt in 0..6 {
            let delay = calculate_delay(&config, attempt, None);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_server_error() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StorageError::from_http_status(503, "unavailable"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: StorageResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::from_http_status(500, "boom"))
        })
        .await;
        assert!(matches!(result, Err(StorageError::ServerError(500, _))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_skips_client_errors() {
        let calls = AtomicU32::new(0);
        let result: StorageResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::from_http_status(404, "missing"))
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
