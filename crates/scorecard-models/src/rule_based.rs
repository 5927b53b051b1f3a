//! Rule-based analysis used when the vision model is unavailable.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRequest;
use crate::pitch::PitcherLevel;

/// Score (0-10) and comment for one mechanical component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricScore {
    pub score: u8,
    pub analysis: String,
}

impl MetricScore {
    fn new(score: u8, analysis: &str) -> Self {
        Self {
            score,
            analysis: analysis.to_string(),
        }
    }
}

/// Canned analysis keyed on pitcher level and pitch type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleBasedAnalysis {
    pub mechanics_score: u8,
    pub injury_indicators: Vec<String>,
    pub key_metrics: BTreeMap<String, MetricScore>,
    pub deviations: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Mechanics score from level base (90 / 70 / 75) plus pitch adjustment, clamped to 0..=100.
pub fn mechanics_score(request: &AnalysisRequest) -> u8 {
    let base: i32 = match request.pitcher_level() {
        PitcherLevel::Elite => 90,
        PitcherLevel::Amateur => 70,
        PitcherLevel::Unlisted => 75,
    };
    (base + request.pitch_type.score_adjustment()).clamp(0, 100) as u8
}

/// Build the fallback analysis for a request.
pub fn rule_based_analysis(request: &AnalysisRequest) -> RuleBasedAnalysis {
    let elite = request.pitcher_level() == PitcherLevel::Elite;
    let lines = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let (injury_indicators, key_metrics, deviations, recommendations) = if elite {
        (
            lines(&[
                "No significant injury risk factors observed",
                "Normal fatigue patterns for professional level",
                "Consistent mechanics throughout delivery",
            ]),
            [
                ("Arm Slot", MetricScore::new(9, "Elite high arm slot held consistently through release")),
                ("Balance", MetricScore::new(9, "Excellent balance and posture throughout delivery")),
                ("Leg Drive", MetricScore::new(9, "Strong, repeatable leg drive with good hip-shoulder separation")),
            ],
            lines(&[
                "Minor timing variation in leg lift phase",
                "Slight early trunk rotation before front foot plants",
                "Occasional glove-side drift during delivery",
            ]),
            lines(&[
                "Fine-tune leg lift timing for optimal rhythm",
                "Delay trunk rotation until front foot is firmly planted",
                "Maintain consistent glove position through release",
            ]),
        )
    } else {
        (
            lines(&[
                "Some inconsistency in arm slot may increase injury risk",
                "Moderate stress on shoulder during late phase",
                "Normal fatigue patterns for development level",
            ]),
            [
                ("Arm Slot", MetricScore::new(7, "Generally good, some inconsistency in late phases")),
                ("Balance", MetricScore::new(6, "Room for improvement in maintaining center of gravity")),
                ("Leg Drive", MetricScore::new(7, "Good power generation, needs a firmer front leg block")),
            ],
            lines(&[
                "Inconsistent leg drive during push-off phase",
                "Arm slot drops during delivery, creating strain on shoulder",
                "Head movement disrupts balance throughout pitching motion",
            ]),
            lines(&[
                "Focus on maintaining consistent leg drive throughout delivery",
                "Practice keeping arm slot high to reduce shoulder strain",
                "Keep head still and aligned with target throughout motion",
            ]),
        )
    };

    RuleBasedAnalysis {
        mechanics_score: mechanics_score(request),
        injury_indicators,
        key_metrics: key_metrics
            .into_iter()
            .map(|(name, score)| (name.to_string(), score))
            .collect(),
        deviations,
        recommendations,
    }
}
