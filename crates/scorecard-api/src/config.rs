//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use scorecard_media::DEFAULT_SLOW_MOTION_FACTOR;

const MB: usize = 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size (uploads included)
    pub max_upload_size: usize,
    /// Upper bound on one mechanics analysis
    pub analysis_timeout: Duration,
    /// Playback speed for slow-motion analysis
    pub slow_motion_factor: f64,
    /// Largest clip sent inline to Gemini; bigger clips go by URL
    pub inline_video_limit: u64,
    /// Scratch space for uploads and transcodes
    pub work_dir: PathBuf,
    /// Service-account key file, if any
    pub credentials_path: Option<PathBuf>,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            request_timeout: Duration::from_secs(600),
            max_upload_size: 200 * MB,
            analysis_timeout: Duration::from_secs(300),
            slow_motion_factor: DEFAULT_SLOW_MOTION_FACTOR,
            inline_video_limit: 18 * MB as u64,
            work_dir: std::env::temp_dir().join("pitcher-scorecard"),
            credentials_path: None,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("SERVER_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host: std::env::var("SERVER_ADDRESS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.host),
            port,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_burst),
            request_timeout: std::env::var("REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE_MB")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .map(|mb| mb * MB)
                .unwrap_or(defaults.max_upload_size),
            analysis_timeout: std::env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
            slow_motion_factor: std::env::var("SLOW_MOTION_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|f: &f64| *f > 0.0 && *f <= 1.0)
                .unwrap_or(defaults.slow_motion_factor),
            inline_video_limit: std::env::var("INLINE_VIDEO_LIMIT_MB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|mb| mb * MB as u64)
                .unwrap_or(defaults.inline_video_limit),
            work_dir: std::env::var("WORK_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            credentials_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Problems that disable a capability. The server starts regardless.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.credentials_path {
            None => warnings.push(
                "GOOGLE_APPLICATION_CREDENTIALS not set; video storage will be unavailable".to_string(),
            ),
            Some(path) if !path.is_file() => warnings.push(format!(
                "Credentials file not found at {}; video storage will be unavailable",
                path.display()
            )),
            Some(_) => {}
        }

        let has_bucket = ["GCP_BUCKET_NAME", "GCS_BUCKET"]
            .iter()
            .any(|k| std::env::var(k).map(|v| !v.trim().is_empty()).unwrap_or(false));
        if !has_bucket {
            warnings.push("GCP_BUCKET_NAME not set; video storage will be unavailable".to_string());
        }

        let has_key = std::env::var("GEMINI_API_KEY")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !has_key {
            warnings.push("GEMINI_API_KEY not set; analyses will use the rule-based fallback".to_string());
        }

        warnings
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "SERVER_ADDRESS",
        "SERVER_PORT",
        "PORT",
        "MAX_UPLOAD_SIZE_MB",
        "ANALYSIS_TIMEOUT_SECS",
        "SLOW_MOTION_FACTOR",
        "INLINE_VIDEO_LIMIT_MB",
        "GOOGLE_APPLICATION_CREDENTIALS",
        "GCP_BUCKET_NAME",
        "GCS_BUCKET",
        "GEMINI_API_KEY",
        "ENVIRONMENT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ApiConfig::from_env();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8501);
        assert_eq!(config.max_upload_size, 200 * MB);
        assert_eq!(config.analysis_timeout, Duration::from_secs(300));
        assert_eq!(config.inline_video_limit, 18 * MB as u64);
        assert!((config.slow_motion_factor - 0.1).abs() < f64::EPSILON);
        assert!(!config.is_production());
    }

    #[test]
    #[serial]
    fn test_port_fallback_and_overrides() {
        clear_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("MAX_UPLOAD_SIZE_MB", "50");
        std::env::set_var("SLOW_MOTION_FACTOR", "2.5");
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_size, 50 * MB);
        // Out of range factors keep the default.
        assert!((config.slow_motion_factor - 0.1).abs() < f64::EPSILON);

        std::env::set_var("SERVER_PORT", "9000");
        assert_eq!(ApiConfig::from_env().port, 9000);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_validate_reports_missing_capabilities() {
        clear_env();
        let warnings = ApiConfig::from_env().validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("GEMINI_API_KEY")));

        std::env::set_var("GEMINI_API_KEY", "AIzaTest");
        std::env::set_var("GCS_BUCKET", "pitch-bucket");
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", "/nonexistent/creds.json");
        let warnings = ApiConfig::from_env().validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("/nonexistent/creds.json"));
        clear_env();
    }
}
