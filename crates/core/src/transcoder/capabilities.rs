//! Encoder capability detection.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use super::config::TranscoderConfig;
use super::traits::TranscodeRoute;
use crate::process::ProcessRunner;

/// Encoders the routes depend on, as reported by `ffmpeg -encoders`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// H.264 via libx264 (sticker/audio to video)
    pub libx264: bool,
    /// Animated WebP via libwebp (to sticker)
    pub libwebp: bool,
    /// PNG (first frame to image)
    pub png: bool,
}

impl EncoderCapabilities {
    /// Detect available encoders by probing ffmpeg. Any failure yields no encoders.
    pub async fn detect(runner: &dyn ProcessRunner, config: &TranscoderConfig) -> Self {
        let output = runner
            .run(
                &config.ffmpeg_path,
                &["-hide_banner".to_string(), "-encoders".to_string()],
                Duration::from_secs(config.probe_timeout_secs),
            )
            .await;

        match output {
            Ok(o) if o.success() => Self::parse(&String::from_utf8_lossy(&o.stdout)),
            _ => Self::default(),
        }
    }

    /// Parses the `-encoders` listing.
    pub fn parse(listing: &str) -> Self {
        // Lines look like " V....D libx264    libx264 H.264 ..."
        let has = |name: &str| {
            listing
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(name))
        };
        Self {
            libx264: has("libx264"),
            libwebp: has("libwebp") || has("libwebp_anim"),
            png: has("png"),
        }
    }

    /// Whether the encoder a route needs is present.
    pub fn supports(&self, route: TranscodeRoute) -> bool {
        match route {
            TranscodeRoute::AnimationToVideo | TranscodeRoute::AudioToVideo => self.libx264,
            TranscodeRoute::FirstFrameToImage => self.png,
            TranscodeRoute::ToWebpSticker => self.libwebp,
        }
    }
}
