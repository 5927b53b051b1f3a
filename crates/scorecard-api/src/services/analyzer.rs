//! Mechanics analysis of one pitching clip.
//!
//! The analyzer degrades instead of failing: without Gemini, or when the
//! model call fails, the caller still gets the rule-based analysis with a
//! warning explaining why. Only unexpected errors (scratch space, a stored
//! video that cannot be fetched) produce a failed outcome.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use scorecard_gemini::{analyze_pitching, GeminiClient, VideoInput};
use scorecard_media::{compress_for_inline, probe_video, slow_motion, FfmpegRunner, VideoInfo, VideoRequirements};
use scorecard_models::{rule_based_analysis, AnalysisOutcome, AnalysisRequest, MechanicsReport, VideoObject};
use scorecard_storage::{GcsUri, StorageError, VideoLibrary};

use crate::config::ApiConfig;
use crate::metrics;

/// Where the clip to analyze comes from.
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// A freshly uploaded file on local disk.
    Upload { path: PathBuf, file_name: String },
    /// A video already in the bucket, by name or `gs://` / public URL.
    Stored { name_or_uri: String },
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knobs taken from [`ApiConfig`].
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub slow_motion_factor: f64,
    pub inline_video_limit: u64,
    pub timeout: Duration,
    pub work_dir: PathBuf,
}

impl From<&ApiConfig> for AnalyzerSettings {
    fn from(config: &ApiConfig) -> Self {
        Self {
            slow_motion_factor: config.slow_motion_factor,
            inline_video_limit: config.inline_video_limit,
            timeout: config.analysis_timeout,
            work_dir: config.work_dir.clone(),
        }
    }
}

/// Clip resolved to a local file, plus its stored copy when there is one.
struct ResolvedVideo {
    local: PathBuf,
    stored: Option<VideoObject>,
}

#[derive(Clone)]
pub struct MechanicsAnalyzer {
    library: Option<VideoLibrary>,
    gemini: Option<GeminiClient>,
    requirements: VideoRequirements,
    settings: AnalyzerSettings,
}

impl MechanicsAnalyzer {
    pub fn new(
        library: Option<VideoLibrary>,
        gemini: Option<GeminiClient>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            library,
            gemini,
            requirements: VideoRequirements::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze a clip. Never errors; failures are reported in the outcome.
    pub async fn analyze(&self, request: AnalysisRequest, source: VideoSource) -> AnalysisOutcome {
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.settings.timeout, self.run(&request, source)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(pitcher = %request.pitcher_name, error = %e, "Mechanics analysis failed");
                AnalysisOutcome::failed(e)
            }
            Err(_) => {
                error!(
                    pitcher = %request.pitcher_name,
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Mechanics analysis timed out"
                );
                AnalysisOutcome::failed(format!(
                    "timed out after {} seconds",
                    self.settings.timeout.as_secs()
                ))
            }
        };

        metrics::record_analysis(source_label(&outcome), start.elapsed().as_secs_f64());
        outcome
    }

    async fn run(&self, request: &AnalysisRequest, source: VideoSource) -> Result<AnalysisOutcome, AnalyzerError> {
        tokio::fs::create_dir_all(&self.settings.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("analysis-")
            .tempdir_in(&self.settings.work_dir)?;

        let mut warnings = Vec::new();

        let resolved = match self.resolve(source, scratch.path(), &mut warnings).await? {
            Some(resolved) => resolved,
            None => return Ok(self.fallback(request, warnings, None)),
        };

        let info = match probe_video(&resolved.local).await {
            Ok(info) => {
                warnings.extend(self.requirements.check(&info));
                Some(info)
            }
            Err(e) => {
                warn!(path = %resolved.local.display(), error = %e, "Could not inspect video");
                warnings.push(format!("Could not inspect video: {}", e));
                None
            }
        };
        if let Some(format_warning) = self.requirements.check_format(&resolved.local) {
            warnings.push(format_warning);
        }

        let Some(gemini) = &self.gemini else {
            warnings.push("Gemini API unavailable; showing rule-based analysis".to_string());
            return Ok(self.fallback(request, warnings, resolved.stored));
        };

        let clip = if request.slow_motion && info.is_some() {
            self.slowed(&resolved.local, scratch.path(), &mut warnings).await
        } else {
            resolved.local.clone()
        };

        let input = match self
            .video_input(&clip, info.as_ref(), resolved.stored.as_ref(), scratch.path())
            .await?
        {
            Some(input) => input,
            None => {
                warnings.push(
                    "Video is too large to send inline and no stored copy is available; \
                     showing rule-based analysis"
                        .to_string(),
                );
                return Ok(self.fallback(request, warnings, resolved.stored));
            }
        };

        match analyze_pitching(gemini, request, &input).await {
            Ok(analysis) => {
                info!(
                    pitcher = %request.pitcher_name,
                    model = %analysis.model,
                    retried = analysis.retried,
                    "Gemini analysis complete"
                );
                let report = MechanicsReport::parse(&analysis.raw_text);
                Ok(AnalysisOutcome::from_report(analysis.model, report)
                    .with_warnings(warnings)
                    .with_video(resolved.stored))
            }
            Err(e) => {
                warn!(pitcher = %request.pitcher_name, error = %e, "Gemini analysis failed");
                warnings.push(format!("Gemini analysis failed ({}); showing rule-based analysis", e));
                Ok(self.fallback(request, warnings, resolved.stored))
            }
        }
    }

    /// Get the clip onto local disk and into the library when possible.
    ///
    /// `None` means there is nothing to analyze (stored video without storage).
    async fn resolve(
        &self,
        source: VideoSource,
        scratch: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<Option<ResolvedVideo>, AnalyzerError> {
        match source {
            VideoSource::Upload { path, file_name } => {
                let Some(library) = &self.library else {
                    warnings.push("Google Cloud Storage unavailable; video was not saved".to_string());
                    return Ok(Some(ResolvedVideo { local: path, stored: None }));
                };

                let stored = match library.find_upload(&file_name).await {
                    Ok(Some(existing)) => {
                        info!(video = %existing.name, "Reusing previously uploaded video");
                        Ok(existing)
                    }
                    Ok(None) => library.upload(&path, &file_name).await,
                    Err(e) => Err(e),
                };

                match stored {
                    Ok(video) => Ok(Some(ResolvedVideo { local: path, stored: Some(video) })),
                    Err(e) => {
                        warn!(file = %file_name, error = %e, "Failed to store uploaded video");
                        warnings.push(format!("Video could not be saved to storage: {}", e));
                        Ok(Some(ResolvedVideo { local: path, stored: None }))
                    }
                }
            }
            VideoSource::Stored { name_or_uri } => {
                let Some(library) = &self.library else {
                    warnings.push(
                        "Google Cloud Storage unavailable; showing rule-based analysis".to_string(),
                    );
                    return Ok(None);
                };

                let stored = if GcsUri::is_uri(&name_or_uri) {
                    let uri = GcsUri::parse(&name_or_uri)?;
                    library.find(&uri.object).await?
                } else {
                    Some(library.info(&name_or_uri).await?)
                };
                let local = library.download(&name_or_uri, scratch).await?;
                Ok(Some(ResolvedVideo { local, stored }))
            }
        }
    }

    /// Slow the clip down; on failure the original is analyzed.
    async fn slowed(&self, clip: &Path, scratch: &Path, warnings: &mut Vec<String>) -> PathBuf {
        let output = scratch.join("slow_motion.mp4");
        let runner = self.runner();
        match slow_motion(&runner, clip, &output, self.settings.slow_motion_factor).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Slow motion failed, analyzing original clip");
                warnings.push(format!("Slow motion failed ({}); analyzed the original clip", e));
                clip.to_path_buf()
            }
        }
    }

    /// Inline the (compressed) clip when it fits, else point at the stored copy.
    async fn video_input(
        &self,
        clip: &Path,
        info: Option<&VideoInfo>,
        stored: Option<&VideoObject>,
        scratch: &Path,
    ) -> Result<Option<VideoInput>, AnalyzerError> {
        let mut candidate = clip.to_path_buf();
        if info.is_some() {
            let runner = self.runner();
            match compress_for_inline(&runner, clip, scratch.join("inline.mp4")).await {
                Ok(path) => candidate = path,
                Err(e) => warn!(error = %e, "Inline compression failed, using clip as-is"),
            }
        }

        let size = tokio::fs::metadata(&candidate).await?.len();
        if size <= self.settings.inline_video_limit {
            match VideoInput::inline_from_file(&candidate).await {
                Ok(input) => return Ok(Some(input)),
                Err(e) => warn!(error = %e, "Could not read clip for inline upload"),
            }
        }

        Ok(stored.map(|video| {
            info!(bytes = size, url = %video.public_url, "Sending video by URL");
            VideoInput::reference(&video.public_url)
        }))
    }

    fn fallback(
        &self,
        request: &AnalysisRequest,
        warnings: Vec<String>,
        video: Option<VideoObject>,
    ) -> AnalysisOutcome {
        AnalysisOutcome::from_rule_based(rule_based_analysis(request))
            .with_warnings(warnings)
            .with_video(video)
    }

    fn runner(&self) -> FfmpegRunner {
        FfmpegRunner::new().with_timeout(self.settings.timeout.as_secs().max(1))
    }
}

fn source_label(outcome: &AnalysisOutcome) -> &'static str {
    use scorecard_models::AnalysisSource;
    match outcome.source {
        AnalysisSource::Gemini { .. } => "gemini",
        AnalysisSource::RuleBased => "rule_based",
        AnalysisSource::Failed => "failed",
    }
}
