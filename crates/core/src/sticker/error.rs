//! Sticker encoder errors.

use thiserror::Error;

use crate::media::ConversionError;
use crate::remote::TransportError;
use crate::transcoder::TranscodeError;

/// Failures of the rich encoding path.
#[derive(Debug, Error)]
pub enum StickerError {
    #[error("Failed to fetch source: {0}")]
    Fetch(String),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Animated source needs a local transcoder")]
    NoTranscoder,

    #[error("Local transcoder {0} is unavailable")]
    LocalUnavailable(String),

    #[error("Transcoder failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("WebP encoding failed: {0}")]
    Encode(String),

    #[error("Invalid WebP container: {0}")]
    Container(String),

    #[error("Failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Encoding task failed: {0}")]
    Task(String),
}

impl From<TransportError> for StickerError {
    fn from(e: TransportError) -> Self {
        Self::Fetch(e.to_string())
    }
}

impl From<StickerError> for ConversionError {
    fn from(err: StickerError) -> Self {
        match err {
            StickerError::Fetch(detail) => ConversionError::remote_failed(detail),
            StickerError::Transcode(e) => e.into(),
            StickerError::NoTranscoder | StickerError::LocalUnavailable(_) => {
                ConversionError::local_unavailable(err.to_string())
            }
            other => ConversionError::local_failed(other.to_string()),
        }
    }
}
