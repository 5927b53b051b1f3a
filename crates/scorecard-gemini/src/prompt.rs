//! Coaching prompt for mechanics analysis.
//!
//! The reply template must keep the section markers that
//! [`scorecard_models::MechanicsReport::parse`] looks for.

use scorecard_models::{AnalysisRequest, PitchType, PitcherLevel, INJURY_SECTION_MARKER, KEY_METRICS_MARKER};

/// Appended to the prompt when a clip accompanies it.
pub const VIDEO_INSTRUCTION: &str = "Analyze this video showing the complete pitching motion.";

fn level_focus(level: PitcherLevel) -> &'static str {
    match level {
        PitcherLevel::Elite => {
            "This is an elite MLB pitcher. Focus on:\n\
             - Refinement of already advanced mechanics\n\
             - Markers of elite-level repeatability\n\
             - Performance optimization at the professional level\n\
             - How high velocity stresses the delivery"
        }
        PitcherLevel::Amateur | PitcherLevel::Unlisted => {
            "This is an amateur pitcher. Focus on:\n\
             - Development of fundamental mechanics\n\
             - Basic form corrections\n\
             - Injury prevention for a developing arm\n\
             - Building a repeatable delivery"
        }
    }
}

fn pitch_focus(pitch: PitchType) -> &'static str {
    match pitch {
        PitchType::Curveball => {
            "For the curveball, evaluate:\n\
             - Arm slot consistency and its effect on spin axis\n\
             - Wrist and finger position at release\n\
             - Timing of hip-shoulder separation\n\
             - Precision of the release point"
        }
        PitchType::Fastball => {
            "For the fastball, evaluate:\n\
             - Power generated through the legs\n\
             - A direct line to the plate\n\
             - Arm speed and timing\n\
             - Completion of the follow-through"
        }
    }
}

const GRADING_CRITERIA: &str = "\
Grade with these criteria:

1. Arm: grade arm action and identify the release point.
   Arm action (A-F):
   * A: efficient path, clean circle, no deviation
   * B: minor path deviation, good timing
   * C: moderate path issues, some timing variance
   * D: significant path issues, poor timing
   * F: severe mechanical issues, injury risk
   Release point:
   * Over the top: above ear level
   * High three-quarters: between ear and top of shoulder
   * Three-quarters: at shoulder level
   * Low three-quarters: between shoulder and elbow
   * Sidearm: at or below the elbow

2. Balance: head position relative to the back hip during the leg lift (A-F):
   * A: head stays within 2 inches of a vertical line from the back hip
   * B: head moves 2-4 inches off that line
   * C: head moves 4-6 inches off that line
   * D: head moves 6-8 inches off that line
   * F: head moves more than 8 inches off that line

3. Stride & Drive: grade leg drive and describe the stride.
   Leg drive (A-F):
   * A: explosive drive that keeps its direction
   * B: good drive, slight loss of direction
   * C: moderate drive, some leakage
   * D: weak drive, significant leakage
   * F: poor drive, severe mechanical issues
   Stride length and direction:
   * Optimal: 85-100% of height, straight to the plate
   * Good: 80-85% of height, slightly closed or open
   * Fair: 75-80% of height, moderately closed or open
   * Poor: under 75% or over 100%, severely closed or open";

/// Build the analysis prompt for one request.
pub fn build_analysis_prompt(request: &AnalysisRequest) -> String {
    format!(
        "You are a professional baseball pitching coach analyzing this pitcher's mechanics \
from the provided video. Be precise and apply the criteria below exactly.

Pitcher: {pitcher}
Pitch Type: {pitch}
Game Context: {context}

{level}

{pitch_focus}

{criteria}

Give one concise analysis covering only these aspects. Format the reply EXACTLY as follows, \
with no other commentary:

{key_metrics}

Arm: [A-F grade for arm action] - [one line on the arm path] | Release Point: [position from the criteria]

Balance: [A-F grade from the head movement criteria] - [one line giving the head movement distance]

Stride & Drive: [A-F grade for leg drive] - [one line on drive quality] | Stride: [length as % of height and direction to the plate]

Overall: [2-4 sentences in the voice of an MLB scout: overall efficiency and potential, the most important adjustment, and the projection if it is made. Be specific about velocity, movement and command.]

{injury}
Risk Level: [Low/High] - [2-3 sentences on the mechanical patterns behind the risk, covering immediate concerns and long-term durability.]
- Low: the default unless there are clear signs of injury or fatigue.
- High: only for clearly concerning signs that need immediate intervention.",
        pitcher = request.pitcher_name.trim(),
        pitch = request.pitch_type.label(),
        context = request.game_context.label(),
        level = level_focus(request.pitcher_level()),
        pitch_focus = pitch_focus(request.pitch_type),
        criteria = GRADING_CRITERIA,
        key_metrics = KEY_METRICS_MARKER,
        injury = INJURY_SECTION_MARKER,
    )
}

/// Prompt used for the second attempt after a reply that ignored the template.
pub fn reinforce_prompt(prompt: &str) -> String {
    format!(
        "{prompt}\n\nIMPORTANT: Analyze the provided video and structure the reply exactly as shown \
above, including every section ({injury} and {key_metrics}).",
        injury = INJURY_SECTION_MARKER.trim_end_matches(':'),
        key_metrics = KEY_METRICS_MARKER.trim_end_matches(':'),
    )
}
