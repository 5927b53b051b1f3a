//! Deployment configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DeployError, DeployResult};

/// Post-deploy smoke test settings.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Text the landing page must contain.
    pub marker: String,
    /// Wait before the first request, while the new revision rolls out.
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Total time allowed, initial delay included.
    pub window: Duration,
    pub request_timeout: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            marker: "Pitcher Scorecard".to_string(),
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(10),
            window: Duration::from_secs(300),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl VerifyConfig {
    /// `VERIFY_*` overrides on top of the defaults.
    pub fn from_env() -> DeployResult<Self> {
        let defaults = Self::default();
        let config = Self {
            marker: env_string("VERIFY_MARKER").unwrap_or(defaults.marker),
            initial_delay: env_secs("VERIFY_INITIAL_DELAY_SECS").unwrap_or(defaults.initial_delay),
            interval: env_secs("VERIFY_INTERVAL_SECS").unwrap_or(defaults.interval),
            window: env_secs("VERIFY_WINDOW_SECS").unwrap_or(defaults.window),
            request_timeout: env_secs("VERIFY_REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DeployResult<()> {
        if self.marker.is_empty() {
            return Err(DeployError::invalid_config("verification marker must not be empty"));
        }
        if self.interval.is_zero() {
            return Err(DeployError::invalid_config("verification interval must be positive"));
        }
        if self.initial_delay > self.window {
            return Err(DeployError::invalid_config(
                "verification initial delay exceeds the verification window",
            ));
        }
        Ok(())
    }
}

/// Everything the pipeline needs to build and ship the service.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub project_id: String,
    pub region: String,
    pub service: String,
    pub registry: String,
    pub image_name: String,
    pub bucket: String,
    pub memory: String,
    pub port: u16,
    /// Secret Manager secret holding the service-account key file.
    pub credentials_secret: String,
    /// Where the key file is mounted inside the container.
    pub credentials_mount: String,
    /// Secret Manager secret injected as `GEMINI_API_KEY`.
    pub api_key_secret: String,
    pub allow_unauthenticated: bool,
    pub main_branch: String,
    pub step_timeout: Duration,
    /// Git checkout the steps run in; the build context for `plan` and `run`.
    pub work_dir: PathBuf,
    /// Remote that webhook runs fetch their commit from.
    pub git_remote: String,
    /// Parent directory of the per-run worktrees made by webhook runs.
    pub checkout_root: PathBuf,
    pub verify: VerifyConfig,
    pub webhook_addr: String,
    pub webhook_token: Option<String>,
}

impl DeployConfig {
    /// Defaults for everything except the project.
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            bucket: format!("{}-videos", project_id),
            project_id,
            region: "us-central1".to_string(),
            service: "pitcher-scorecard".to_string(),
            registry: "gcr.io".to_string(),
            image_name: "pitcher-scorecard".to_string(),
            memory: "8Gi".to_string(),
            port: 8501,
            credentials_secret: "gcp-service-account".to_string(),
            credentials_mount: "/app/credentials/service-account.json".to_string(),
            api_key_secret: "gemini-api-key".to_string(),
            allow_unauthenticated: true,
            main_branch: "main".to_string(),
            step_timeout: Duration::from_secs(1800),
            work_dir: PathBuf::from("."),
            git_remote: "origin".to_string(),
            checkout_root: std::env::temp_dir().join("scorecard-deploy"),
            verify: VerifyConfig::default(),
            webhook_addr: "0.0.0.0:9000".to_string(),
            webhook_token: None,
        }
    }

    /// Load from environment. `GCP_PROJECT_ID` (or `GOOGLE_CLOUD_PROJECT`) is required.
    pub fn from_env() -> DeployResult<Self> {
        let project_id = env_string("GCP_PROJECT_ID")
            .or_else(|| env_string("GOOGLE_CLOUD_PROJECT"))
            .ok_or_else(|| DeployError::not_configured("GCP_PROJECT_ID or GOOGLE_CLOUD_PROJECT must be set"))?;

        let mut config = Self::new(project_id);

        if let Some(region) = env_string("GCP_LOCATION") {
            config.region = region;
        }
        if let Some(bucket) = env_string("GCP_BUCKET_NAME").or_else(|| env_string("GCS_BUCKET")) {
            config.bucket = bucket;
        }
        override_string(&mut config.service, "DEPLOY_SERVICE_NAME");
        override_string(&mut config.registry, "DEPLOY_REGISTRY");
        override_string(&mut config.image_name, "DEPLOY_IMAGE_NAME");
        override_string(&mut config.memory, "DEPLOY_MEMORY");
        override_string(&mut config.credentials_secret, "DEPLOY_CREDENTIALS_SECRET");
        override_string(&mut config.credentials_mount, "DEPLOY_CREDENTIALS_MOUNT");
        override_string(&mut config.api_key_secret, "DEPLOY_API_KEY_SECRET");
        override_string(&mut config.main_branch, "DEPLOY_MAIN_BRANCH");
        override_string(&mut config.webhook_addr, "WEBHOOK_ADDRESS");
        override_string(&mut config.git_remote, "DEPLOY_GIT_REMOTE");

        config.port = std::env::var("DEPLOY_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.port);

        config.allow_unauthenticated = std::env::var("DEPLOY_ALLOW_UNAUTHENTICATED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(config.allow_unauthenticated);

        config.step_timeout = env_secs("DEPLOY_STEP_TIMEOUT_SECS").unwrap_or(config.step_timeout);
        config.verify = VerifyConfig::from_env()?;

        if let Some(dir) = env_string("DEPLOY_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_string("DEPLOY_CHECKOUT_DIR") {
            config.checkout_root = PathBuf::from(dir);
        }
        config.webhook_token = env_string("WEBHOOK_TOKEN");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DeployResult<()> {
        if !self.credentials_mount.starts_with('/') {
            return Err(DeployError::invalid_config(format!(
                "credentials mount must be an absolute path, got {}",
                self.credentials_mount
            )));
        }
        if !self.checkout_root.is_absolute() {
            return Err(DeployError::invalid_config(format!(
                "checkout directory must be an absolute path, got {}",
                self.checkout_root.display()
            )));
        }
        self.verify.validate()
    }

    /// Registry path without a tag, e.g. `gcr.io/my-project/pitcher-scorecard`.
    pub fn image(&self) -> String {
        format!("{}/{}/{}", self.registry, self.project_id, self.image_name)
    }

    pub fn image_ref(&self, commit: &str) -> String {
        format!("{}:{}", self.image(), commit)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_string(target: &mut String, key: &str) {
    if let Some(value) = env_string(key) {
        *target = value;
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}
