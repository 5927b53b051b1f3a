//! FFmpeg CLI wrapper for pitching clip preparation.
//!
//! This crate provides:
//! - FFprobe metadata extraction
//! - Type-safe FFmpeg command building with timeout and cancellation
//! - Slow motion, trimming and inline-size compression of clips
//! - Advisory checks against the recommended recording requirements

pub mod command;
pub mod error;
pub mod probe;
pub mod requirements;
pub mod transform;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{parse_probe_output, probe_video, VideoInfo};
pub use requirements::VideoRequirements;
pub use transform::{
    compress_for_inline, fit_within, inline_command, slow_motion, slow_motion_command, trim, trim_command, Trimmed,
    DEFAULT_SLOW_MOTION_FACTOR,
};
