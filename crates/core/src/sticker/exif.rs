//! Sticker pack metadata in the WebP `EXIF` chunk.
//!
//! Layout: little-endian TIFF header, a single IFD entry with tag `0x5741`
//! (type UNDEFINED) pointing at a JSON document right after the IFD.

use serde::{Deserialize, Serialize};

/// IFD tag chat clients read the sticker JSON from.
pub const STICKER_TAG: u16 = 0x5741;

const TIFF_TYPE_UNDEFINED: u16 = 7;
/// Header (8) + entry count (2) + one entry (12). Chat clients expect no
/// next-IFD offset, the JSON follows the entry directly.
const JSON_OFFSET: u32 = 22;

/// Decoded sticker metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerMetadata {
    #[serde(rename = "sticker-pack-id")]
    pub pack_id: String,
    #[serde(rename = "sticker-pack-name")]
    pub pack_name: String,
    #[serde(rename = "sticker-pack-publisher")]
    pub publisher: String,
    #[serde(default)]
    pub emojis: Vec<String>,
}

impl StickerMetadata {
    pub fn new(
        pack_id: impl Into<String>,
        pack_name: impl Into<String>,
        publisher: impl Into<String>,
        emojis: Vec<String>,
    ) -> Self {
        Self {
            pack_id: pack_id.into(),
            pack_name: pack_name.into(),
            publisher: publisher.into(),
            emojis,
        }
    }
}

/// Serializes metadata into a TIFF/EXIF block.
pub fn encode_exif(metadata: &StickerMetadata) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(metadata)?;
    let len = json.len() as u32;

    let mut block = Vec::with_capacity(JSON_OFFSET as usize + json.len());
    // "II", 42, offset of IFD0
    block.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
    // one entry
    block.extend_from_slice(&1u16.to_le_bytes());
    block.extend_from_slice(&STICKER_TAG.to_le_bytes());
    block.extend_from_slice(&TIFF_TYPE_UNDEFINED.to_le_bytes());
    block.extend_from_slice(&len.to_le_bytes());
    block.extend_from_slice(&JSON_OFFSET.to_le_bytes());
    block.extend_from_slice(&json);
    Ok(block)
}

/// Parses a TIFF/EXIF block and extracts the sticker JSON, if present.
pub fn decode_exif(block: &[u8]) -> Option<StickerMetadata> {
    // Some writers keep the JPEG-style "Exif\0\0" prefix
    let tiff = block.strip_prefix(b"Exif\0\0").unwrap_or(block);
    if tiff.len() < 8 || &tiff[0..4] != b"II\x2A\x00" {
        return None;
    }

    let ifd = read_u32(tiff, 4)? as usize;
    let count = read_u16(tiff, ifd)? as usize;
    (0..count).find_map(|i| {
        let entry = ifd + 2 + i * 12;
        if read_u16(tiff, entry)? != STICKER_TAG {
            return None;
        }
        let len = read_u32(tiff, entry + 4)? as usize;
        let data = if len <= 4 {
            tiff.get(entry + 8..entry + 8 + len)?
        } else {
            let offset = read_u32(tiff, entry + 8)? as usize;
            tiff.get(offset..offset.checked_add(len)?)?
        };
        serde_json::from_slice(data).ok()
    })
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
