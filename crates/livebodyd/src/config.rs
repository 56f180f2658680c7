use std::path::PathBuf;

use livebody_core::{Orientation, ScreenMapping, DEFAULT_THRESHOLD};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `detection/` and `live/` model assets.
    pub asset_dir: PathBuf,
    /// Preview frame width in pixels (default: 640).
    pub preview_width: u32,
    /// Preview frame height in pixels (default: 480).
    pub preview_height: u32,
    /// EXIF-style orientation code passed with every frame (default: 7).
    pub orientation: Orientation,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Treat the preview as rotated by 90° when mapping boxes to the screen.
    pub swap_axes: bool,
    /// Liveness decision threshold attached to results.
    pub threshold: f32,
    /// Replay rate of the frame source.
    pub fps: u32,
    /// File of concatenated NV21 frames to replay.
    pub frames_path: Option<PathBuf>,
    /// JSON script for the in-process engine. Required without `native`.
    pub script_path: Option<PathBuf>,
    /// Restart the frame file from the top at end of file.
    pub looping: bool,
}

impl Config {
    /// Load configuration from `LIVEBODY_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let parsed_u32 = |key: &str, default: u32| env_u32(var(key), default);
        let path = |key: &str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        Self {
            asset_dir: path("LIVEBODY_ASSET_DIR").unwrap_or_else(|| PathBuf::from("assets")),
            preview_width: parsed_u32("LIVEBODY_PREVIEW_WIDTH", 640),
            preview_height: parsed_u32("LIVEBODY_PREVIEW_HEIGHT", 480),
            orientation: var("LIVEBODY_ORIENTATION")
                .and_then(|v| v.trim().parse::<i32>().ok())
                .map(Orientation::from)
                .unwrap_or(Orientation::TRANSVERSE),
            screen_width: parsed_u32("LIVEBODY_SCREEN_WIDTH", 1080),
            screen_height: parsed_u32("LIVEBODY_SCREEN_HEIGHT", 1920),
            swap_axes: var("LIVEBODY_SWAP_AXES").map(|v| v != "0").unwrap_or(true),
            threshold: env_f32(var("LIVEBODY_THRESHOLD"), DEFAULT_THRESHOLD),
            fps: parsed_u32("LIVEBODY_FPS", 30).max(1),
            frames_path: path("LIVEBODY_FRAMES"),
            script_path: path("LIVEBODY_SCRIPT"),
            looping: var("LIVEBODY_LOOP").map(|v| v != "0").unwrap_or(false),
        }
    }

    /// Preview-to-screen mapping, identity if the preview size is zero.
    pub fn screen_mapping(&self) -> ScreenMapping {
        ScreenMapping::for_preview(
            self.screen_width,
            self.screen_height,
            self.preview_width,
            self.preview_height,
            self.swap_axes,
        )
        .unwrap_or_default()
    }
}

fn env_f32(value: Option<String>, default: f32) -> f32 {
    value
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_u32(value: Option<String>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_vga_preview() {
        let config = load(&[]);
        assert_eq!(config.preview_width, 640);
        assert_eq!(config.preview_height, 480);
        assert_eq!(config.orientation, Orientation::TRANSVERSE);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert!(config.swap_axes);
        assert!(config.frames_path.is_none());
        assert!(!config.looping);
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = load(&[
            ("LIVEBODY_PREVIEW_WIDTH", "1280"),
            ("LIVEBODY_ORIENTATION", "6"),
            ("LIVEBODY_THRESHOLD", "NaN"),
            ("LIVEBODY_FPS", "0"),
            ("LIVEBODY_SWAP_AXES", "0"),
            ("LIVEBODY_FRAMES", "/tmp/frames.nv21"),
            ("LIVEBODY_SCREEN_HEIGHT", "tall"),
        ]);
        assert_eq!(config.preview_width, 1280);
        assert_eq!(config.orientation, Orientation::ROTATE_90_CW);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.fps, 1);
        assert!(!config.swap_axes);
        assert_eq!(config.frames_path, Some(PathBuf::from("/tmp/frames.nv21")));
        assert_eq!(config.screen_height, 1920);
    }

    #[test]
    fn screen_mapping_follows_swap_flag() {
        let mut config = load(&[
            ("LIVEBODY_SCREEN_WIDTH", "960"),
            ("LIVEBODY_SCREEN_HEIGHT", "1280"),
        ]);
        assert_eq!(config.screen_mapping(), ScreenMapping::new(2.0, 2.0));
        config.preview_height = 0;
        assert_eq!(config.screen_mapping(), ScreenMapping::default());
    }
}
