//! Result of a mechanics analysis as returned to clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::report::MechanicsReport;
use crate::rule_based::RuleBasedAnalysis;
use crate::video::VideoObject;

/// Which path produced the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Vision model reply
    Gemini { model: String },
    /// Canned analysis (model or storage unavailable)
    RuleBased,
    /// The analysis could not be produced
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutcome {
    pub source: AnalysisSource,

    /// 0-100; absent for model replies, which carry letter grades instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanics_score: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<MechanicsReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_based: Option<RuleBasedAnalysis>,

    #[serde(default)]
    pub deviations: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    /// Non-fatal problems (degraded capabilities, video requirement misses)
    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoObject>,
}

impl AnalysisOutcome {
    pub fn from_report(model: impl Into<String>, report: MechanicsReport) -> Self {
        Self {
            source: AnalysisSource::Gemini { model: model.into() },
            mechanics_score: None,
            report: Some(report),
            rule_based: None,
            deviations: Vec::new(),
            recommendations: Vec::new(),
            warnings: Vec::new(),
            video: None,
        }
    }

    pub fn from_rule_based(analysis: RuleBasedAnalysis) -> Self {
        Self {
            source: AnalysisSource::RuleBased,
            mechanics_score: Some(analysis.mechanics_score),
            deviations: analysis.deviations.clone(),
            recommendations: analysis.recommendations.clone(),
            report: None,
            rule_based: Some(analysis),
            warnings: Vec::new(),
            video: None,
        }
    }

    /// Outcome reported when the analysis itself errored.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            source: AnalysisSource::Failed,
            mechanics_score: Some(0),
            report: None,
            rule_based: None,
            deviations: vec![format!("Analysis failed: {}", message)],
            recommendations: vec!["Please try again or contact support".to_string()],
            warnings: Vec::new(),
            video: None,
        }
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_video(mut self, video: Option<VideoObject>) -> Self {
        self.video = video;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.source == AnalysisSource::Failed
    }
}
