//! Configuration for the local transcoder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::QualityTier;

/// Configuration for the ffmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary, used to measure animations sent without a duration.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for a single ffmpeg run in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the `-version` availability probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Re-run the availability probe for every request instead of caching it.
    #[serde(default)]
    pub reprobe_availability: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg arguments inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// x264 preset for sticker to video.
    #[serde(default = "default_preset")]
    pub x264_preset: String,

    /// CRF used at high quality (0-51, lower is better).
    #[serde(default = "default_crf_high")]
    pub crf_high: u8,

    /// CRF used at degraded quality.
    #[serde(default = "default_crf_degraded")]
    pub crf_degraded: u8,

    /// Square edge of every generated frame.
    #[serde(default = "default_frame_size")]
    pub frame_size: u32,

    /// Frame rate for animated sticker output.
    #[serde(default = "default_sticker_fps")]
    pub sticker_fps: u32,

    /// libwebp quality (0-100) for animated stickers at high quality.
    #[serde(default = "default_webp_quality_high")]
    pub webp_quality_high: u8,

    /// libwebp quality (0-100) for animated stickers at degraded quality.
    #[serde(default = "default_webp_quality_degraded")]
    pub webp_quality_degraded: u8,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_preset() -> String {
    "slow".to_string()
}

fn default_crf_high() -> u8 {
    18
}

fn default_crf_degraded() -> u8 {
    51
}

fn default_frame_size() -> u32 {
    512
}

fn default_sticker_fps() -> u32 {
    15
}

fn default_webp_quality_high() -> u8 {
    50
}

fn default_webp_quality_degraded() -> u8 {
    20
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            reprobe_availability: false,
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            x264_preset: default_preset(),
            crf_high: default_crf_high(),
            crf_degraded: default_crf_degraded(),
            frame_size: default_frame_size(),
            sticker_fps: default_sticker_fps(),
            webp_quality_high: default_webp_quality_high(),
            webp_quality_degraded: default_webp_quality_degraded(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// CRF for a quality tier.
    pub fn crf(&self, quality: QualityTier) -> u8 {
        match quality {
            QualityTier::High => self.crf_high,
            QualityTier::Degraded => self.crf_degraded,
        }
    }

    /// libwebp quality for a quality tier.
    pub fn webp_quality(&self, quality: QualityTier) -> u8 {
        match quality {
            QualityTier::High => self.webp_quality_high,
            QualityTier::Degraded => self.webp_quality_degraded,
        }
    }
}
