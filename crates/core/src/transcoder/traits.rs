//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use bytes::Bytes;

use super::capabilities::EncoderCapabilities;
use super::error::TranscodeError;
use crate::media::{ConversionRequest, InputMedia, SourceKind, TargetKind};
use crate::temp::TempScope;

/// A local transcoder that converts media through an external binary.
#[async_trait]
pub trait LocalTranscoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Whether the transcoder binary starts and exits cleanly. No side effects.
    async fn probe_availability(&self) -> bool;

    /// Encoders the binary reports, when it can list them.
    async fn encoders(&self) -> Option<EncoderCapabilities> {
        None
    }

    /// Playback length of `input` in seconds, when the transcoder can measure it.
    async fn measure_duration(&self, _input: &InputMedia, _scope: &TempScope) -> Option<f64> {
        None
    }

    /// Converts `input` according to `request`, keeping every working file
    /// inside `scope`. Returns the output bytes.
    async fn transcode(
        &self,
        input: &InputMedia,
        request: &ConversionRequest,
        scope: &TempScope,
    ) -> Result<Bytes, TranscodeError>;
}

/// The ffmpeg pipeline used for a source/target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeRoute {
    /// Animated sticker or video to H.264 MP4.
    AnimationToVideo,
    /// Audio track over a black canvas to MP4.
    AudioToVideo,
    /// First frame to PNG.
    FirstFrameToImage,
    /// Image or animation to a libwebp sticker.
    ToWebpSticker,
}

impl TranscodeRoute {
    /// Picks the route for a pair, or `None` when ffmpeg has nothing to do.
    pub fn resolve(source: SourceKind, target: TargetKind) -> Option<Self> {
        match (source, target) {
            (SourceKind::Sticker | SourceKind::Video, TargetKind::Video) => {
                Some(Self::AnimationToVideo)
            }
            (SourceKind::Sticker | SourceKind::Video, TargetKind::Image) => {
                Some(Self::FirstFrameToImage)
            }
            (SourceKind::Audio, TargetKind::Video) => Some(Self::AudioToVideo),
            (SourceKind::Image | SourceKind::Video | SourceKind::Sticker, TargetKind::Sticker) => {
                Some(Self::ToWebpSticker)
            }
            _ => None,
        }
    }

    /// Output container of this route.
    pub fn output(&self) -> TargetKind {
        match self {
            Self::AnimationToVideo | Self::AudioToVideo => TargetKind::Video,
            Self::FirstFrameToImage => TargetKind::Image,
            Self::ToWebpSticker => TargetKind::Sticker,
        }
    }
}
