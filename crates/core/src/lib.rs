//! Media conversion pipeline for chat stickers.
//!
//! Turns stickers, images, animations and audio into MP4, PNG or WebP
//! stickers. A local ffmpeg does the work when installed; a web-form
//! conversion service takes over when it is not or when it fails.

pub mod config;
pub mod fallback;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod remote;
pub mod sticker;
pub mod temp;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use media::{
    Backend, ConversionError, ConversionOutcome, ConversionRequest, ConvertedMedia,
    FailureReason, InputMedia, MediaPayload, QualityTier, SourceKind, StickerLayout, TargetKind,
};
pub use orchestrator::{Capabilities, ConversionOrchestrator, OrchestratorConfig};
pub use reqwest::Url;
pub use sticker::{read_metadata, StickerMetadata};
