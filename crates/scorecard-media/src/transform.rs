//! Clip transformations applied before analysis.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Playback speed used when the caller does not choose one (10% speed).
pub const DEFAULT_SLOW_MOTION_FACTOR: f64 = 0.1;

/// Bounding box for clips sent inline to the model.
const INLINE_MAX_WIDTH: u32 = 640;
const INLINE_MAX_HEIGHT: u32 = 480;
/// Upper bound on frames kept for inline clips.
const INLINE_MAX_FRAMES: u64 = 150;
/// Seconds of footage kept for inline clips.
const INLINE_MAX_SECONDS: f64 = 5.0;

/// Result of [`trim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trimmed {
    /// A shortened copy was written.
    Trimmed(PathBuf),
    /// The source was already short enough and is returned as-is.
    Unchanged(PathBuf),
}

impl Trimmed {
    pub fn path(&self) -> &Path {
        match self {
            Trimmed::Trimmed(p) | Trimmed::Unchanged(p) => p,
        }
    }
}

/// Re-encode `input` at `factor` times normal speed.
///
/// `factor` must lie in `(0, 1]`; 0.1 plays the clip ten times slower.
/// The output frame rate is scaled by the same factor so the frame count
/// stays constant.
pub async fn slow_motion(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    factor: f64,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !(factor > 0.0 && factor <= 1.0) {
        return Err(MediaError::invalid_parameter(format!(
            "slow motion factor must be in (0, 1], got {}",
            factor
        )));
    }

    let info = probe_video(input).await?;
    info!(
        input = %input.display(),
        factor,
        input_fps = info.fps,
        output_fps = info.fps * factor,
        "Creating slow motion clip"
    );

    let cmd = slow_motion_command(input, output, &info, factor);

    runner.run(&cmd).await?;
    ensure_non_empty(output).await?;
    Ok(output.to_path_buf())
}

/// Keep only the first `seconds` of `input`, copying streams.
pub async fn trim(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    seconds: f64,
) -> MediaResult<Trimmed> {
    let input = input.as_ref();
    let output = output.as_ref();

    if seconds <= 0.0 {
        return Err(MediaError::invalid_parameter("trim length must be positive"));
    }

    let info = probe_video(input).await?;
    if info.duration > 0.0 && info.duration <= seconds {
        return Ok(Trimmed::Unchanged(input.to_path_buf()));
    }

    let cmd = trim_command(input, output, seconds);
    runner.run(&cmd).await?;
    ensure_non_empty(output).await?;

    info!(input = %input.display(), seconds, "Trimmed clip");
    Ok(Trimmed::Trimmed(output.to_path_buf()))
}

/// Shrink a clip so it fits in a single inline request.
///
/// Scales into 640x480 and keeps at most `min(fps * 5, 150)` frames.
pub async fn compress_for_inline(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    let output = output.as_ref();

    let info = probe_video(input).await?;
    let cmd = inline_command(input, output, &info);

    runner.run(&cmd).await?;
    let size = ensure_non_empty(output).await?;

    info!(
        input = %input.display(),
        width = info.width,
        height = info.height,
        bytes = size,
        "Compressed clip for inline upload"
    );
    Ok(output.to_path_buf())
}

/// `setpts` stretch plus an output rate of `fps * factor`, H.264.
pub fn slow_motion_command(input: &Path, output: &Path, info: &VideoInfo, factor: f64) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(format!("setpts={}*PTS", 1.0 / factor))
        .frame_rate(info.fps * factor)
        .video_codec("libx264")
        .preset("medium")
        .crf(23)
        .faststart()
}

pub fn trim_command(input: &Path, output: &Path, seconds: f64) -> FfmpegCommand {
    FfmpegCommand::new(input, output).duration(seconds).stream_copy()
}

/// Scaled into 640x480, at most `min(fps * 5, 150)` frames, no audio.
pub fn inline_command(input: &Path, output: &Path, info: &VideoInfo) -> FfmpegCommand {
    let (width, height) = fit_within(info.width, info.height, INLINE_MAX_WIDTH, INLINE_MAX_HEIGHT);
    let max_frames = ((info.fps * INLINE_MAX_SECONDS) as u64).clamp(1, INLINE_MAX_FRAMES);

    FfmpegCommand::new(input, output)
        .video_filter(format!("scale={}:{}", width, height))
        .max_frames(max_frames)
        .video_codec("libx264")
        .preset("fast")
        .crf(28)
        .no_audio()
        .faststart()
}

/// Scale `width`x`height` down to fit the box, preserving aspect ratio.
///
/// Dimensions are rounded down to even numbers (H.264 requirement) and never
/// drop below 2. Clips already inside the box keep their size, evened.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (even(max_width), even(max_height));
    }

    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);

    let w = (width as f64 * scale).floor() as u32;
    let h = (height as f64 * scale).floor() as u32;
    (even(w), even(h))
}

fn even(v: u32) -> u32 {
    (v - v % 2).max(2)
}

async fn ensure_non_empty(path: &Path) -> MediaResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        _ => {
            warn!(path = %path.display(), "FFmpeg produced no output");
            Err(MediaError::EmptyOutput(path.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(width: u32, height: u32, fps: f64) -> VideoInfo {
        VideoInfo {
            duration: 8.0,
            width,
            height,
            fps,
            frames: (8.0 * fps) as u64,
            codec: "h264".to_string(),
            size: 0,
            bitrate: 0,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    #[test]
    fn test_slow_motion_args() {
        let args = slow_motion_command(
            Path::new("pitch.mp4"),
            Path::new("slow.mp4"),
            &clip(1920, 1080, 30.0),
            DEFAULT_SLOW_MOTION_FACTOR,
        )
        .build_args();

        assert_eq!(value_after(&args, "-vf"), "setpts=10*PTS");
        assert_eq!(value_after(&args, "-r"), "3");
        assert_eq!(value_after(&args, "-c:v"), "libx264");
        assert_eq!(value_after(&args, "-preset"), "medium");
        assert_eq!(value_after(&args, "-crf"), "23");
        assert_eq!(value_after(&args, "-movflags"), "+faststart");
        assert_eq!(value_after(&args, "-i"), "pitch.mp4");
        assert_eq!(args.last().unwrap(), "slow.mp4");

        let args = slow_motion_command(
            Path::new("pitch.mp4"),
            Path::new("slow.mp4"),
            &clip(1920, 1080, 240.0),
            0.25,
        )
        .build_args();
        assert_eq!(value_after(&args, "-vf"), "setpts=4*PTS");
        assert_eq!(value_after(&args, "-r"), "60");
    }

    #[test]
    fn test_trim_args() {
        let args = trim_command(Path::new("pitch.mov"), Path::new("short.mov"), 15.0).build_args();
        assert_eq!(value_after(&args, "-t"), "15.000");
        assert_eq!(value_after(&args, "-c"), "copy");
    }

    #[test]
    fn test_inline_args() {
        let args = inline_command(Path::new("pitch.mp4"), Path::new("inline.mp4"), &clip(1920, 1080, 60.0))
            .build_args();
        assert_eq!(value_after(&args, "-vf"), "scale=640:360");
        assert_eq!(value_after(&args, "-frames:v"), "150");
        assert!(args.contains(&"-an".to_string()));

        // 24 fps * 5 s stays under the cap.
        let args = inline_command(Path::new("pitch.mp4"), Path::new("inline.mp4"), &clip(720, 1280, 24.0))
            .build_args();
        assert_eq!(value_after(&args, "-vf"), "scale=270:480");
        assert_eq!(value_after(&args, "-frames:v"), "120");
    }

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(1920, 1080, 640, 480), (640, 360));
    }

    #[test]
    fn test_fit_within_portrait() {
        assert_eq!(fit_within(1080, 1920, 640, 480), (270, 480));
    }

    #[test]
    fn test_fit_within_small_clip_kept() {
        assert_eq!(fit_within(320, 240, 640, 480), (320, 240));
        assert_eq!(fit_within(321, 241, 640, 480), (320, 240));
    }

    #[test]
    fn test_fit_within_zero_dimensions() {
        assert_eq!(fit_within(0, 0, 640, 480), (640, 480));
    }

    #[tokio::test]
    async fn test_slow_motion_rejects_bad_factor() {
        let runner = FfmpegRunner::new();
        for factor in [0.0, -0.5, 1.5] {
            let err = slow_motion(&runner, "in.mp4", "out.mp4", factor)
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::InvalidParameter(_)));
        }
    }

    #[tokio::test]
    async fn test_trim_rejects_non_positive_length() {
        let runner = FfmpegRunner::new();
        let err = trim(&runner, "in.mp4", "out.mp4", 0.0).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_ensure_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        tokio::fs::write(&path, b"").await.unwrap();
        assert!(matches!(
            ensure_non_empty(&path).await,
            Err(MediaError::EmptyOutput(_))
        ));
        tokio::fs::write(&path, b"data").await.unwrap();
        assert_eq!(ensure_non_empty(&path).await.unwrap(), 4);
    }
}
