//! Landing page.

use axum::extract::State;
use axum::response::Html;

use scorecard_media::VideoRequirements;
use scorecard_models::{GameContext, PitchType};

use crate::state::AppState;

/// Shown in the page title; the deployment smoke test looks for it.
pub const APP_TITLE: &str = "Pitcher Scorecard";

const PITCHER_OPTIONS: &[&str] = &["Amateur", "Clayton Kershaw"];

fn options<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    items
        .into_iter()
        .map(|(value, label)| format!("<option value=\"{}\">{}</option>", value, label))
        .collect::<Vec<_>>()
        .join("")
}

fn availability(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "unavailable"
    }
}

/// Upload form plus the recording guidelines.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let requirements = VideoRequirements::default();

    let pitchers = options(PITCHER_OPTIONS.iter().map(|p| (*p, *p)));
    let pitches = options(
        [PitchType::Fastball, PitchType::Curveball]
            .iter()
            .map(|p| (p.label(), p.label())),
    );
    let contexts = options(GameContext::all().iter().map(|c| (c.as_str(), c.label())));

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h1>{title}</h1>
<p>Gemini analysis: {gemini}. Video storage: {storage}.</p>
<form action="/api/analyze" method="post" enctype="multipart/form-data">
<p><label>Pitching video <input type="file" name="video" accept="video/mp4,video/quicktime,video/x-msvideo,video/mpeg"></label></p>
<p><label>Pitcher Level/Name <select name="pitcher">{pitchers}</select></label></p>
<p><label>Pitch Type <select name="pitch_type">{pitches}</select></label></p>
<p><label>Game Context <select name="game_context">{contexts}</select></label></p>
<input type="hidden" name="slow_motion" value="false">
<p><label><input type="checkbox" name="slow_motion" value="true" checked> Use Slow Motion Analysis (Recommended)</label></p>
<p><button type="submit">Analyze Pitching Mechanics</button></p>
</form>
<h2>Recording guidelines</h2>
<ul>
<li>Duration: {min_dur}-{max_dur} seconds</li>
<li>Resolution: at least {min_w}x{min_h}</li>
<li>Frame rate: {fps} fps recommended</li>
<li>Formats: {formats}</li>
<li>Maximum upload: {max_mb} MB</li>
</ul>
</body>
</html>
"#,
        title = APP_TITLE,
        gemini = availability(state.gemini.is_some()),
        storage = availability(state.library.is_some()),
        pitchers = pitchers,
        pitches = pitches,
        contexts = contexts,
        min_dur = requirements.min_duration_secs,
        max_dur = requirements.max_duration_secs,
        min_w = requirements.min_width,
        min_h = requirements.min_height,
        fps = requirements.recommended_fps,
        formats = requirements.formats.join(", ").to_uppercase(),
        max_mb = state.config.max_upload_size / (1024 * 1024),
    ))
}
