//! Types shared by every stage of the conversion pipeline.

use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ConversionError;

/// Media handed over by a collaborator (chat client, HTTP caller).
///
/// Immutable once constructed. `source_url` is set when the caller only has a
/// remote locator; in that case `bytes` may be empty.
#[derive(Debug, Clone)]
pub struct InputMedia {
    pub bytes: Bytes,
    pub declared_mime: String,
    pub duration_seconds: Option<f64>,
    /// Animation flag as reported by the collaborator.
    pub animated: bool,
    pub source_url: Option<Url>,
}

impl InputMedia {
    pub fn new(bytes: impl Into<Bytes>, declared_mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime: declared_mime.into(),
            duration_seconds: None,
            animated: false,
            source_url: None,
        }
    }

    /// Media that only exists behind a URL.
    pub fn from_url(url: Url, declared_mime: impl Into<String>) -> Self {
        Self {
            bytes: Bytes::new(),
            declared_mime: declared_mime.into(),
            duration_seconds: None,
            animated: false,
            source_url: Some(url),
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What the prober decided the input is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sticker,
    Image,
    Video,
    Audio,
}

impl SourceKind {
    /// File extension used for the on-disk copy handed to ffmpeg.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sticker => "webp",
            Self::Image => "img",
            Self::Video => "mp4",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sticker => "sticker",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        };
        f.write_str(s)
    }
}

/// Requested output kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Image,
    Video,
    Sticker,
}

impl TargetKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Image => "image/png",
            Self::Video => "video/mp4",
            Self::Sticker => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Video => "mp4",
            Self::Sticker => "webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Sticker => "sticker",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "img" | "png" => Ok(Self::Image),
            "video" | "mp4" => Ok(Self::Video),
            "sticker" | "webp" => Ok(Self::Sticker),
            other => Err(format!("unknown target kind: {}", other)),
        }
    }
}

/// Named quality preset, mapped to concrete encoder parameters by the transcoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    #[default]
    High,
    Degraded,
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "degraded" | "low" | "fast" => Ok(Self::Degraded),
            other => Err(format!("unknown quality tier: {}", other)),
        }
    }
}

/// Sticker container layout.
///
/// `Full` keeps the aspect ratio and pads with transparency, `Default`
/// stretches to the square canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerLayout {
    #[default]
    Default,
    Full,
}

impl StickerLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for StickerLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "stretch" => Ok(Self::Default),
            "full" | "pad" => Ok(Self::Full),
            other => Err(format!("unknown sticker layout: {}", other)),
        }
    }
}

/// One conversion invocation. Constructed once, never mutated by the pipeline
/// except for the degraded-retry copy the orchestrator derives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Filled by the prober when not set by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    pub target: TargetKind,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub quality: QualityTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Overrides the layout derived from `animated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<StickerLayout>,
    #[serde(default)]
    pub emojis: Vec<String>,
}

impl ConversionRequest {
    pub fn new(target: TargetKind) -> Self {
        Self {
            source: None,
            target,
            animated: false,
            quality: QualityTier::High,
            pack_name: None,
            author_name: None,
            layout: None,
            emojis: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_pack(mut self, pack_name: impl Into<String>) -> Self {
        self.pack_name = Some(pack_name.into());
        self
    }

    pub fn with_author(mut self, author_name: impl Into<String>) -> Self {
        self.author_name = Some(author_name.into());
        self
    }

    pub fn with_layout(mut self, layout: StickerLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_emojis<I, S>(mut self, emojis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emojis = emojis.into_iter().map(Into::into).collect();
        self
    }

    /// Layout to use for a sticker container.
    pub fn effective_layout(&self) -> StickerLayout {
        self.layout.unwrap_or(if self.animated {
            StickerLayout::Full
        } else {
            StickerLayout::Default
        })
    }

    /// A copy of this request at degraded quality.
    pub fn degraded(&self) -> Self {
        Self {
            quality: QualityTier::Degraded,
            ..self.clone()
        }
    }
}

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Local,
    Remote,
    Encoder,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Encoder => "encoder",
        }
    }
}

/// Converted payload: in-memory bytes, or a locator when remote results are
/// not downloaded.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPayload {
    Bytes(Bytes),
    Locator(Url),
}

/// Successful conversion. The byte payload is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedMedia {
    payload: MediaPayload,
    target: TargetKind,
    backend: Backend,
}

impl ConvertedMedia {
    /// Wraps converted bytes, rejecting an empty buffer.
    pub fn from_bytes(
        bytes: impl Into<Bytes>,
        target: TargetKind,
        backend: Backend,
    ) -> Result<Self, ConversionError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConversionError::EmptyOutput {
                detail: format!("{} backend produced no bytes", backend.as_str()),
            });
        }
        Ok(Self {
            payload: MediaPayload::Bytes(bytes),
            target,
            backend,
        })
    }

    pub fn from_locator(url: Url, target: TargetKind) -> Self {
        Self {
            payload: MediaPayload::Locator(url),
            target,
            backend: Backend::Remote,
        }
    }

    pub fn payload(&self) -> &MediaPayload {
        &self.payload
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.payload {
            MediaPayload::Bytes(b) => Some(b),
            MediaPayload::Locator(_) => None,
        }
    }

    pub fn into_payload(self) -> MediaPayload {
        self.payload
    }
}

/// Outcome of a conversion: exactly one of a payload or a typed failure.
pub type ConversionOutcome = Result<ConvertedMedia, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FailureReason;

    #[test]
    fn test_converted_media_rejects_empty_bytes() {
        let err = ConvertedMedia::from_bytes(Bytes::new(), TargetKind::Video, Backend::Local)
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::EmptyOutput);
    }

    #[test]
    fn test_converted_media_keeps_bytes() {
        let media =
            ConvertedMedia::from_bytes(vec![1u8, 2, 3], TargetKind::Image, Backend::Remote)
                .unwrap();
        assert_eq!(media.bytes().unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(media.target(), TargetKind::Image);
        assert_eq!(media.backend(), Backend::Remote);
    }

    #[test]
    fn test_effective_layout_follows_animation() {
        let still = ConversionRequest::new(TargetKind::Sticker);
        assert_eq!(still.effective_layout(), StickerLayout::Default);

        let animated = ConversionRequest::new(TargetKind::Sticker).with_animated(true);
        assert_eq!(animated.effective_layout(), StickerLayout::Full);

        let forced = animated.with_layout(StickerLayout::Default);
        assert_eq!(forced.effective_layout(), StickerLayout::Default);
    }

    #[test]
    fn test_degraded_copy() {
        let request = ConversionRequest::new(TargetKind::Video).with_pack("p");
        let degraded = request.degraded();
        assert_eq!(degraded.quality, QualityTier::Degraded);
        assert_eq!(degraded.pack_name.as_deref(), Some("p"));
        assert_eq!(request.quality, QualityTier::High);
    }

    #[test]
    fn test_target_kind_parsing() {
        assert_eq!("video".parse::<TargetKind>().unwrap(), TargetKind::Video);
        assert_eq!("PNG".parse::<TargetKind>().unwrap(), TargetKind::Image);
        assert_eq!("webp".parse::<TargetKind>().unwrap(), TargetKind::Sticker);
        assert!("gif".parse::<TargetKind>().is_err());
    }

    #[test]
    fn test_layout_and_quality_parsing() {
        assert_eq!("full".parse::<StickerLayout>().unwrap(), StickerLayout::Full);
        assert_eq!("Default".parse::<StickerLayout>().unwrap(), StickerLayout::Default);
        assert!("square".parse::<StickerLayout>().is_err());
        assert_eq!("low".parse::<QualityTier>().unwrap(), QualityTier::Degraded);
    }

    #[test]
    fn test_request_serialization_defaults() {
        let request: ConversionRequest = serde_json::from_str(r#"{"target":"sticker"}"#).unwrap();
        assert_eq!(request.target, TargetKind::Sticker);
        assert_eq!(request.quality, QualityTier::High);
        assert!(!request.animated);
        assert!(request.emojis.is_empty());
    }
}
