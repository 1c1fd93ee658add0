//! Media descriptors, conversion requests and the outcome type.

mod error;
mod types;

pub use error::{ConversionError, FailureReason};
pub use types::{
    Backend, ConversionOutcome, ConversionRequest, ConvertedMedia, InputMedia, MediaPayload,
    QualityTier, SourceKind, StickerLayout, TargetKind,
};
