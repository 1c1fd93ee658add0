//! Sticker container encoding and metadata.

mod config;
mod encoder;
mod error;
mod exif;

pub use config::EncoderConfig;
pub use encoder::{inject_metadata, read_metadata, StickerEncoder, StickerSource};
pub use error::StickerError;
pub use exif::{decode_exif, encode_exif, StickerMetadata, STICKER_TAG};
