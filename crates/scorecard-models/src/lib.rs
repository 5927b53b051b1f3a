//! Shared data models for the Pitcher Scorecard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis requests (pitcher, pitch type, game context)
//! - Parsed mechanics reports and their grades
//! - Rule-based fallback analysis
//! - Stored video objects and naming rules

pub mod analysis;
pub mod outcome;
pub mod pitch;
pub mod report;
pub mod rule_based;
pub mod video;

pub use analysis::AnalysisRequest;
pub use outcome::{AnalysisOutcome, AnalysisSource};
pub use pitch::{GameContext, ParseError, PitchType, PitcherLevel};
pub use report::{
    has_required_sections, Grade, InjuryAssessment, MechanicsReport, MetricAssessment, RiskLevel,
    INJURY_SECTION_MARKER, KEY_METRICS_MARKER,
};
pub use rule_based::{mechanics_score, rule_based_analysis, MetricScore, RuleBasedAnalysis};
pub use video::{
    content_type_for, extension_of, is_supported_video, sanitize_video_name, VideoNameError, VideoObject,
    SUPPORTED_VIDEO_EXTENSIONS,
};
