//! Sticker encoder configuration.

use serde::{Deserialize, Serialize};

use crate::media::QualityTier;

/// Defaults for sticker metadata and in-process encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Pack name used when a request carries none.
    #[serde(default = "default_pack")]
    pub default_pack: String,

    /// Publisher used when a request carries none.
    #[serde(default = "default_author")]
    pub default_author: String,

    /// Emojis used when a request carries none.
    #[serde(default)]
    pub default_emojis: Vec<String>,

    /// Square canvas edge in pixels.
    #[serde(default = "default_canvas_size")]
    pub canvas_size: u32,

    /// libwebp quality (0-100) for still stickers.
    #[serde(default = "default_quality")]
    pub quality: f32,

    /// libwebp quality (0-100) for still stickers at degraded quality.
    #[serde(default = "default_quality_degraded")]
    pub quality_degraded: f32,
}

fn default_pack() -> String {
    "stickerline".to_string()
}

fn default_author() -> String {
    "stickerline".to_string()
}

fn default_canvas_size() -> u32 {
    512
}

fn default_quality() -> f32 {
    75.0
}

fn default_quality_degraded() -> f32 {
    40.0
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            default_pack: default_pack(),
            default_author: default_author(),
            default_emojis: Vec::new(),
            canvas_size: default_canvas_size(),
            quality: default_quality(),
            quality_degraded: default_quality_degraded(),
        }
    }
}

impl EncoderConfig {
    pub fn quality_for(&self, tier: QualityTier) -> f32 {
        match tier {
            QualityTier::High => self.quality,
            QualityTier::Degraded => self.quality_degraded,
        }
    }
}
