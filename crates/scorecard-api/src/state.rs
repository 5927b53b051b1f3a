//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use scorecard_gemini::GeminiClient;
use scorecard_storage::{GcsClient, VideoLibrary};

use crate::config::ApiConfig;
use crate::services::{AnalyzerSettings, MechanicsAnalyzer};

/// Shared application state.
///
/// Storage and Gemini are optional; each is initialised on its own and a
/// failure only disables that capability.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub library: Option<Arc<VideoLibrary>>,
    pub gemini: Option<Arc<GeminiClient>>,
    pub analyzer: Arc<MechanicsAnalyzer>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Self {
        let library = init_storage().await;
        let gemini = init_gemini().await;
        Self::with_services(config, library, gemini)
    }

    /// Build state from already constructed clients.
    pub fn with_services(config: ApiConfig, library: Option<VideoLibrary>, gemini: Option<GeminiClient>) -> Self {
        let analyzer = MechanicsAnalyzer::new(library.clone(), gemini.clone(), AnalyzerSettings::from(&config));
        Self {
            config,
            library: library.map(Arc::new),
            gemini: gemini.map(Arc::new),
            analyzer: Arc::new(analyzer),
        }
    }
}

async fn init_storage() -> Option<VideoLibrary> {
    let client = match GcsClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Google Cloud Storage disabled");
            return None;
        }
    };

    if let Err(e) = client.ensure_bucket().await {
        warn!(bucket = %client.bucket(), error = %e, "Google Cloud Storage disabled: bucket unavailable");
        return None;
    }

    info!(bucket = %client.bucket(), "Google Cloud Storage ready");
    Some(VideoLibrary::new(client))
}

async fn init_gemini() -> Option<GeminiClient> {
    let client = match GeminiClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Gemini analysis disabled");
            return None;
        }
    };

    match client.check_model().await {
        Ok(()) => info!(model = %client.config().primary_model(), "Gemini API ready"),
        Err(e) if e.is_auth_error() => {
            warn!(error = %e, "Gemini analysis disabled: API key rejected");
            return None;
        }
        // Transient failures keep the client; each analysis falls back on its own.
        Err(e) => warn!(error = %e, "Gemini model check failed"),
    }

    Some(client)
}
