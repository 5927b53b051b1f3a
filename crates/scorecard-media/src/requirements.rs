//! Recommended recording parameters for pitching clips.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::probe::VideoInfo;

/// Recording guidelines. Violations are reported, never enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequirements {
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub min_width: u32,
    pub min_height: u32,
    /// Preferred frame rate; most baseball footage is shot at 60 fps.
    pub recommended_fps: f64,
    /// Lowercase extensions without the dot.
    pub formats: Vec<String>,
}

impl Default for VideoRequirements {
    fn default() -> Self {
        Self {
            min_duration_secs: 5.0,
            max_duration_secs: 15.0,
            min_width: 720,
            min_height: 480,
            recommended_fps: 60.0,
            formats: vec!["mp4".to_string(), "mov".to_string()],
        }
    }
}

impl VideoRequirements {
    /// Advisory warnings for a probed clip. Empty when the clip conforms.
    pub fn check(&self, info: &VideoInfo) -> Vec<String> {
        let mut warnings = Vec::new();

        if info.duration > 0.0 && info.duration < self.min_duration_secs {
            warnings.push(format!(
                "Video is {:.1}s long; at least {:.0}s is recommended to capture the full wind-up",
                info.duration, self.min_duration_secs
            ));
        }
        if info.duration > self.max_duration_secs {
            warnings.push(format!(
                "Video is {:.1}s long; clips over {:.0}s may be slow to analyze",
                info.duration, self.max_duration_secs
            ));
        }
        if info.width < self.min_width || info.height < self.min_height {
            warnings.push(format!(
                "Resolution {}x{} is below the recommended {}x{}",
                info.width, info.height, self.min_width, self.min_height
            ));
        }
        if info.fps > 0.0 && info.fps + 0.5 < self.recommended_fps {
            warnings.push(format!(
                "Frame rate {:.0} fps is below the recommended {:.0} fps",
                info.fps, self.recommended_fps
            ));
        }

        warnings
    }

    /// Warning when the file extension is not a preferred format.
    pub fn check_format(&self, path: impl AsRef<Path>) -> Option<String> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if self.formats.iter().any(|f| *f == ext) {
            None
        } else {
            Some(format!(
                "Format '{}' is not one of the recommended formats ({})",
                ext,
                self.formats.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(duration: f64, width: u32, height: u32, fps: f64) -> VideoInfo {
        VideoInfo {
            duration,
            width,
            height,
            fps,
            frames: (duration * fps) as u64,
            codec: "h264".to_string(),
            size: 0,
            bitrate: 0,
        }
    }

    #[test]
    fn test_conforming_clip() {
        let req = VideoRequirements::default();
        assert!(req.check(&info(8.0, 1920, 1080, 59.94)).is_empty());
    }

    #[test]
    fn test_short_low_res_clip() {
        let req = VideoRequirements::default();
        let warnings = req.check(&info(3.0, 640, 360, 30.0));
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("at least 5s"));
        assert!(warnings[1].contains("640x360"));
    }

    #[test]
    fn test_long_clip() {
        let req = VideoRequirements::default();
        let warnings = req.check(&info(20.0, 1280, 720, 60.0));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("over 15s"));
    }

    #[test]
    fn test_check_format() {
        let req = VideoRequirements::default();
        assert!(req.check_format("clip.MOV").is_none());
        assert!(req.check_format("clip.avi").unwrap().contains("avi"));
    }
}
