//! One mechanics analysis against Gemini.

use scorecard_models::{has_required_sections, AnalysisRequest};
use tracing::{info, warn};

use crate::client::{GeminiClient, VideoInput};
use crate::error::GeminiResult;
use crate::prompt::{build_analysis_prompt, reinforce_prompt, VIDEO_INSTRUCTION};

/// Raw model reply for a pitching clip.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchingAnalysis {
    pub raw_text: String,
    pub model: String,
    /// The first reply missed the template and a reinforced prompt was sent.
    pub retried: bool,
}

/// Ask Gemini for a mechanics analysis of `video`.
///
/// A reply without the required sections gets exactly one retry with a
/// reinforced prompt; the second reply is returned as-is.
pub async fn analyze_pitching(
    client: &GeminiClient,
    request: &AnalysisRequest,
    video: &VideoInput,
) -> GeminiResult<PitchingAnalysis> {
    let prompt = format!("{}\n\n{}", build_analysis_prompt(request), VIDEO_INSTRUCTION);

    info!(
        pitcher = %request.pitcher_name,
        pitch_type = %request.pitch_type.label(),
        game_context = %request.game_context.label(),
        "Sending mechanics analysis request to Gemini"
    );

    let first = client.generate(&prompt, video).await?;
    if has_required_sections(&first.text) {
        return Ok(PitchingAnalysis {
            raw_text: first.text,
            model: first.model,
            retried: false,
        });
    }

    warn!(model = %first.model, "Response missing expected sections, retrying with reinforced prompt");
    let second = client.generate(&reinforce_prompt(&prompt), video).await?;
    if !has_required_sections(&second.text) {
        warn!(model = %second.model, "Reinforced response still missing expected sections");
    }

    Ok(PitchingAnalysis {
        raw_text: second.text,
        model: second.model,
        retried: true,
    })
}
