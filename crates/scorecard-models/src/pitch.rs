//! Pitcher, pitch and game context classifications.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a classification label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Skill tier inferred from the pitcher name entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PitcherLevel {
    /// Reference MLB pitcher (Clayton Kershaw)
    Elite,
    /// Developing / amateur pitcher
    Amateur,
    /// Anything else the UI did not offer
    Unlisted,
}

impl PitcherLevel {
    /// Classify a free-text pitcher name.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("kershaw") {
            PitcherLevel::Elite
        } else if lower.contains("amateur") {
            PitcherLevel::Amateur
        } else {
            PitcherLevel::Unlisted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PitcherLevel::Elite => "elite",
            PitcherLevel::Amateur => "amateur",
            PitcherLevel::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for PitcherLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pitch being thrown in the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PitchType {
    #[default]
    Fastball,
    Curveball,
}

impl PitchType {
    pub fn label(&self) -> &'static str {
        match self {
            PitchType::Fastball => "Fastball",
            PitchType::Curveball => "Curveball",
        }
    }

    /// Adjustment applied to the rule-based mechanics score.
    pub fn score_adjustment(&self) -> i32 {
        match self {
            PitchType::Fastball => 2,
            PitchType::Curveball => -2,
        }
    }
}

impl fmt::Display for PitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PitchType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fastball" => Ok(PitchType::Fastball),
            "curveball" => Ok(PitchType::Curveball),
            _ => Err(ParseError::new("pitch type", s)),
        }
    }
}

/// Situation the pitch was thrown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameContext {
    /// Bullpen or practice session
    #[default]
    Practice,
    /// Regular season game
    RegularSeason,
    /// Late-inning / playoff pressure
    HighPressure,
    /// Perfect game in progress
    PerfectGame,
}

impl GameContext {
    /// Label shown to users and passed to the model.
    pub fn label(&self) -> &'static str {
        match self {
            GameContext::Practice => "Bullpen/Practice Session",
            GameContext::RegularSeason => "Regular Season Game",
            GameContext::HighPressure => "High Pressure Situation",
            GameContext::PerfectGame => "Perfect Game",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameContext::Practice => "practice",
            GameContext::RegularSeason => "regular_season",
            GameContext::HighPressure => "high_pressure",
            GameContext::PerfectGame => "perfect_game",
        }
    }

    pub fn all() -> [GameContext; 4] {
        [
            GameContext::Practice,
            GameContext::RegularSeason,
            GameContext::HighPressure,
            GameContext::PerfectGame,
        ]
    }
}

impl fmt::Display for GameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for GameContext {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        GameContext::all()
            .into_iter()
            .find(|ctx| ctx.as_str() == normalized || ctx.label().to_lowercase() == normalized)
            .or_else(|| match normalized.as_str() {
                "bullpen" | "practice session" => Some(GameContext::Practice),
                "regular season" => Some(GameContext::RegularSeason),
                "high pressure" => Some(GameContext::HighPressure),
                _ => None,
            })
            .ok_or_else(|| ParseError::new("game context", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitcher_level_from_name() {
        assert_eq!(PitcherLevel::from_name("Clayton Kershaw"), PitcherLevel::Elite);
        assert_eq!(PitcherLevel::from_name("KERSHAW"), PitcherLevel::Elite);
        assert_eq!(PitcherLevel::from_name("Amateur"), PitcherLevel::Amateur);
        assert_eq!(PitcherLevel::from_name("Little League"), PitcherLevel::Unlisted);
    }

    #[test]
    fn test_pitch_type_parse() {
        assert_eq!("Fastball".parse::<PitchType>().unwrap(), PitchType::Fastball);
        assert_eq!(" curveball ".parse::<PitchType>().unwrap(), PitchType::Curveball);
        assert!("slider".parse::<PitchType>().is_err());
    }

    #[test]
    fn test_game_context_parse_labels_and_names() {
        assert_eq!(
            "Bullpen/Practice Session".parse::<GameContext>().unwrap(),
            GameContext::Practice
        );
        assert_eq!(
            "regular_season".parse::<GameContext>().unwrap(),
            GameContext::RegularSeason
        );
        assert_eq!(
            "Regular Season".parse::<GameContext>().unwrap(),
            GameContext::RegularSeason
        );
        let err = "World Series".parse::<GameContext>().unwrap_err();
        assert_eq!(err.kind, "game context");
    }

    #[test]
    fn test_game_context_serde() {
        let json = serde_json::to_string(&GameContext::PerfectGame).unwrap();
        assert_eq!(json, "\"perfect_game\"");
    }
}
