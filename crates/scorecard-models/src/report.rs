//! Mechanics report parsed from the model's free-text reply.
//!
//! The reply follows a fixed template: a `KEY METRICS:` block with `Arm:`,
//! `Balance:`, `Stride & Drive:` and `Overall:` entries, followed by an
//! `INJURY/FATIGUE INDICATORS:` block containing a `Risk Level:` line.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Marker opening the metrics block.
pub const KEY_METRICS_MARKER: &str = "KEY METRICS:";

/// Marker opening the injury block.
pub const INJURY_SECTION_MARKER: &str = "INJURY/FATIGUE INDICATORS:";

const ARM_LABEL: &str = "Arm:";
const BALANCE_LABEL: &str = "Balance:";
const STRIDE_LABEL: &str = "Stride & Drive:";
const OVERALL_LABEL: &str = "Overall:";

fn grade_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-F])\s*[-:]").expect("valid grade regex"))
}

fn risk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Risk Level:\s*(\w+)\s*[-:]\s*(.*)").expect("valid risk regex"))
}

/// Check that a reply contains both template blocks.
pub fn has_required_sections(text: &str) -> bool {
    text.contains(KEY_METRICS_MARKER) && text.contains(INJURY_SECTION_MARKER)
}

/// Letter grade for a mechanical component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Grade::A),
            'B' => Some(Grade::B),
            'C' => Some(Grade::C),
            'D' => Some(Grade::D),
            'F' => Some(Grade::F),
            _ => None,
        }
    }

    /// C and below are flagged for the pitcher.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Grade::C | Grade::D | Grade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One graded metric (arm, balance, stride & drive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricAssessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,

    /// Main observation
    pub summary: String,

    /// Secondary observation after the `|` separator (release point, stride)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl MetricAssessment {
    /// Parse the text following a metric label.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        // The first grade marker is the grade; every marker is dropped from the text.
        let grade = grade_regex()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().chars().next())
            .and_then(Grade::from_char);
        let rest = grade_regex().replace_all(text, "").into_owned();

        let (summary, detail) = match rest.split_once('|') {
            Some((main, extra)) => {
                let extra = extra.trim();
                (main.to_string(), (!extra.is_empty()).then(|| extra.to_string()))
            }
            None => (rest, None),
        };

        Self {
            grade,
            summary: summary.trim().trim_start_matches('-').trim().to_string(),
            detail,
        }
    }
}

/// Injury / fatigue risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    High,
}

impl RiskLevel {
    /// Unknown words fall back to `Low`, the template's default classification.
    pub fn from_word(word: &str) -> Self {
        if word.eq_ignore_ascii_case("high") {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InjuryAssessment {
    pub level: RiskLevel,
    /// Level word as the model wrote it, e.g. "Moderate"
    pub label: String,
    pub explanation: String,
}

/// Structured view of a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MechanicsReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm: Option<MetricAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<MetricAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride_drive: Option<MetricAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injury: Option<InjuryAssessment>,
    /// Unmodified reply text
    pub raw_analysis: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Arm,
    Balance,
    Stride,
    Overall,
}

impl MechanicsReport {
    /// Parse a model reply. Missing entries are left as `None`.
    pub fn parse(raw: &str) -> Self {
        let mut arm = String::new();
        let mut balance = String::new();
        let mut stride = String::new();
        let mut overall = String::new();
        let mut current: Option<Field> = None;

        for line in raw.lines() {
            let line = normalize_line(line);

            if line.is_empty() || line.contains(INJURY_SECTION_MARKER) || line.contains(KEY_METRICS_MARKER) {
                current = None;
                continue;
            }

            let started = [
                (ARM_LABEL, Field::Arm),
                (BALANCE_LABEL, Field::Balance),
                (STRIDE_LABEL, Field::Stride),
                (OVERALL_LABEL, Field::Overall),
            ]
            .into_iter()
            .find_map(|(label, field)| line.strip_prefix(label).map(|rest| (field, rest.trim().to_string())));

            let (field, text) = match started {
                Some((field, text)) => {
                    current = Some(field);
                    (field, text)
                }
                None => match current {
                    Some(field) => (field, line),
                    None => continue,
                },
            };

            let target = match field {
                Field::Arm => &mut arm,
                Field::Balance => &mut balance,
                Field::Stride => &mut stride,
                Field::Overall => &mut overall,
            };
            if !target.is_empty() && !text.is_empty() {
                target.push(' ');
            }
            target.push_str(&text);
        }

        let metric = |text: String| (!text.is_empty()).then(|| MetricAssessment::parse(&text));

        Self {
            arm: metric(arm),
            balance: metric(balance),
            stride_drive: metric(stride),
            overall: (!overall.is_empty()).then_some(overall),
            injury: parse_injury(raw),
            raw_analysis: raw.to_string(),
        }
    }

    /// Metrics graded C or below.
    pub fn flagged_metrics(&self) -> Vec<&'static str> {
        [
            ("Arm", &self.arm),
            ("Balance", &self.balance),
            ("Stride & Drive", &self.stride_drive),
        ]
        .into_iter()
        .filter(|(_, m)| {
            m.as_ref()
                .and_then(|m| m.grade)
                .map(|g| g.needs_attention())
                .unwrap_or(false)
        })
        .map(|(name, _)| name)
        .collect()
    }
}

/// Strip markdown emphasis and bullets the model sometimes adds.
fn normalize_line(line: &str) -> String {
    line.replace("**", "")
        .trim()
        .trim_start_matches(['#', '*'])
        .trim()
        .to_string()
}

/// The risk line of the injury block; the block ends at the next blank line.
fn parse_injury(raw: &str) -> Option<InjuryAssessment> {
    let start = raw.find(INJURY_SECTION_MARKER)?;
    let rest = &raw[start + INJURY_SECTION_MARKER.len()..];
    let block = rest
        .split("\n\n")
        .find(|section| !section.trim().is_empty())?
        .replace("**", "");
    let caps = risk_regex().captures(&block)?;
    let label = caps.get(1)?.as_str().to_string();
    let explanation = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(InjuryAssessment {
        level: RiskLevel::from_word(&label),
        label,
        explanation,
    })
}
