//! Post-deploy smoke test.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::VerifyConfig;
use crate::error::{DeployError, DeployResult};

/// Successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub url: String,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// Poll `url` until the response body contains the marker.
///
/// Waits `initial_delay`, then polls every `interval` until `window` has
/// elapsed since the call. The last poll happens at the end of the window.
/// Settings that fail [`VerifyConfig::validate`] are rejected before any request.
pub async fn verify_deployment(
    client: &reqwest::Client,
    url: &str,
    settings: &VerifyConfig,
) -> DeployResult<Verification> {
    settings.validate()?;

    let started = Instant::now();
    let deadline = started + settings.window;

    info!(
        "Verifying {} (marker {:?}, window {:?})",
        url, settings.marker, settings.window
    );
    tokio::time::sleep(settings.initial_delay.min(settings.window)).await;

    let mut attempts = 0;
    let mut last_problem = String::from("no request completed");

    loop {
        attempts += 1;
        match poll_once(client, url, &settings.marker, settings.request_timeout).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                info!("{} is serving the expected page after {} attempt(s)", url, attempts);
                return Ok(Verification {
                    url: url.to_string(),
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            Err(problem) => {
                debug!(attempt = attempts, "Verification attempt failed: {}", problem);
                last_problem = problem;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(settings.interval.min(deadline - now)).await;
    }

    Err(DeployError::verification_failed(format!(
        "{} did not serve {:?} within {:?} after {} attempt(s): {}",
        url,
        settings.marker,
        settings.window,
        attempts,
        last_problem
    )))
}

async fn poll_once(client: &reqwest::Client, url: &str, marker: &str, timeout: Duration) -> Result<(), String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;

    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    if !body.contains(marker) {
        return Err(format!("HTTP {} without marker", status));
    }
    Ok(())
}
