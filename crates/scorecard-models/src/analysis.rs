//! Analysis request model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::pitch::{GameContext, PitchType, PitcherLevel};

/// Parameters of a single mechanics analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    /// Pitcher name or level as entered by the user
    pub pitcher_name: String,

    #[serde(default)]
    pub pitch_type: PitchType,

    #[serde(default)]
    pub game_context: GameContext,

    /// Slow the clip down before analysis
    #[serde(default = "default_slow_motion")]
    pub slow_motion: bool,
}

fn default_slow_motion() -> bool {
    true
}

impl AnalysisRequest {
    pub fn new(pitcher_name: impl Into<String>, pitch_type: PitchType, game_context: GameContext) -> Self {
        Self {
            pitcher_name: pitcher_name.into(),
            pitch_type,
            game_context,
            slow_motion: true,
        }
    }

    pub fn with_slow_motion(mut self, slow_motion: bool) -> Self {
        self.slow_motion = slow_motion;
        self
    }

    pub fn pitcher_level(&self) -> PitcherLevel {
        PitcherLevel::from_name(&self.pitcher_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let req: AnalysisRequest = serde_json::from_str(r#"{"pitcher_name": "Amateur"}"#).unwrap();
        assert_eq!(req.pitch_type, PitchType::Fastball);
        assert_eq!(req.game_context, GameContext::Practice);
        assert!(req.slow_motion);
        assert_eq!(req.pitcher_level(), PitcherLevel::Amateur);
    }
}
