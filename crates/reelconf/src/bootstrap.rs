//! Bootstrap configuration - seeds runtime state, then runtime owns it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Initial editor settings. The runtime settings container takes over after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Language tag applied to the first slide and to hydrated buffers.
    #[serde(default = "EditorConfig::default_language")]
    pub language: String,

    /// Theme name handed to the renderer.
    #[serde(default = "EditorConfig::default_theme")]
    pub theme: String,
}

impl EditorConfig {
    fn default_language() -> String {
        "typescript".to_string()
    }

    fn default_theme() -> String {
        "catppuccin-mocha".to_string()
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            language: Self::default_language(),
            theme: Self::default_theme(),
        }
    }
}

/// Playback timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Time each slide stays on screen.
    #[serde(default = "PlaybackConfig::default_slide_interval_ms")]
    pub slide_interval_ms: u64,

    /// Pause between arming the run and showing the first slide.
    #[serde(default = "PlaybackConfig::default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Lines of each slide pushed to the display sink.
    #[serde(default = "PlaybackConfig::default_max_lines")]
    pub max_lines: usize,

    /// Upper bound on a single buffer read during playback. Unset = wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_ms: Option<u64>,
}

impl PlaybackConfig {
    fn default_slide_interval_ms() -> u64 {
        2000
    }

    fn default_settle_delay_ms() -> u64 {
        1000
    }

    fn default_max_lines() -> usize {
        100
    }

    pub fn slide_interval(&self) -> Duration {
        Duration::from_millis(self.slide_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            slide_interval_ms: Self::default_slide_interval_ms(),
            settle_delay_ms: Self::default_settle_delay_ms(),
            max_lines: Self::default_max_lines(),
            step_timeout_ms: None,
        }
    }
}

/// Morph animation options. Opaque to codereel, forwarded to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "AnimationConfig::default_duration_ms")]
    pub duration_ms: u64,

    #[serde(default = "AnimationConfig::default_stagger")]
    pub stagger: f64,

    #[serde(default = "default_true")]
    pub line_numbers: bool,

    #[serde(default = "default_true")]
    pub enhance_matching: bool,

    #[serde(default = "default_true")]
    pub animate_container: bool,
}

fn default_true() -> bool {
    true
}

impl AnimationConfig {
    fn default_duration_ms() -> u64 {
        800
    }

    fn default_stagger() -> f64 {
        0.3
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: Self::default_duration_ms(),
            stagger: Self::default_stagger(),
            line_numbers: true,
            enhance_matching: true,
            animate_container: true,
        }
    }
}

/// Screen capture encoding options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "CaptureConfig::default_mime_type")]
    pub mime_type: String,

    #[serde(default = "CaptureConfig::default_video_bits_per_second")]
    pub video_bits_per_second: u64,

    #[serde(default = "CaptureConfig::default_frame_rate")]
    pub frame_rate: u32,

    /// Name offered for the downloaded recording.
    #[serde(default = "CaptureConfig::default_file_name")]
    pub file_name: String,
}

impl CaptureConfig {
    fn default_mime_type() -> String {
        "video/webm;codecs=vp9".to_string()
    }

    fn default_video_bits_per_second() -> u64 {
        10_000_000
    }

    fn default_frame_rate() -> u32 {
        60
    }

    fn default_file_name() -> String {
        "screen-recording.webm".to_string()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mime_type: Self::default_mime_type(),
            video_bits_per_second: Self::default_video_bits_per_second(),
            frame_rate: Self::default_frame_rate(),
            file_name: Self::default_file_name(),
        }
    }
}

/// Periodic save of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "AutosaveConfig::default_interval_ms")]
    pub interval_ms: u64,
}

impl AutosaveConfig {
    fn default_interval_ms() -> u64 {
        5000
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
        }
    }
}

/// Bootstrap configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub animation: AnimationConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub autosave: AutosaveConfig,
}
