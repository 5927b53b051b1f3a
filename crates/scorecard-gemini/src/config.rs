//! Gemini configuration.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{GeminiError, GeminiResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_FALLBACK_MODELS: &[&str] = &["gemini-2.0-flash-lite", "gemini-1.5-flash"];

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Models tried in order; the first is the primary.
    pub models: Vec<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("models", &self.models)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut models = vec![DEFAULT_MODEL.to_string()];
        models.extend(DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()));
        Self {
            api_key: api_key.into(),
            models,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            timeout: Duration::from_secs(180),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GeminiError::not_configured("GEMINI_API_KEY not set"))?;

        if api_key.starts_with("AIza") {
            info!(key_len = api_key.len(), "Gemini API key loaded");
        } else {
            warn!(
                key_len = api_key.len(),
                "GEMINI_API_KEY does not start with the expected 'AIza' prefix"
            );
        }

        let mut config = Self::new(api_key);

        if let Some(primary) = std::env::var("GEMINI_MODEL").ok().filter(|m| !m.trim().is_empty()) {
            config.models[0] = primary.trim().to_string();
        }
        if let Ok(fallbacks) = std::env::var("GEMINI_FALLBACK_MODELS") {
            config.models.truncate(1);
            config.models.extend(
                fallbacks
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from),
            );
        }
        config.models.dedup();

        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        config.temperature = std::env::var("GEMINI_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.temperature);

        config.max_output_tokens = std::env::var("GEMINI_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.max_output_tokens);

        config.timeout = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.timeout);

        Ok(config)
    }

    pub fn primary_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or(DEFAULT_MODEL)
    }
}
