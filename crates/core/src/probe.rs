//! Input classification by declared MIME type and container markers.
//!
//! Classification is pure: no file is written and no process is spawned, so
//! unusable input is rejected before any I/O happens.

use crate::media::{ConversionError, InputMedia, SourceKind};

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedMedia {
    pub kind: SourceKind,
    pub animated: bool,
}

/// Classifies input media.
pub fn classify(input: &InputMedia) -> Result<ProbedMedia, ConversionError> {
    if input.is_empty() && input.source_url.is_none() {
        return Err(ConversionError::probe_rejected("input has no bytes"));
    }

    let mime = input.declared_mime.trim().to_ascii_lowercase();
    let bytes = input.bytes.as_ref();

    if mime.contains("webp") || mime.contains("sticker") {
        // Sticker messages occasionally carry a video payload
        if is_video_container(bytes) {
            return Ok(ProbedMedia {
                kind: SourceKind::Video,
                animated: true,
            });
        }
        return Ok(ProbedMedia {
            kind: SourceKind::Sticker,
            animated: input.animated || is_animated_webp(bytes),
        });
    }

    if mime == "image/gif" {
        return Ok(ProbedMedia {
            kind: SourceKind::Video,
            animated: true,
        });
    }

    if mime.starts_with("image/") {
        return Ok(ProbedMedia {
            kind: SourceKind::Image,
            animated: false,
        });
    }

    if mime.starts_with("video/") {
        return Ok(ProbedMedia {
            kind: SourceKind::Video,
            animated: true,
        });
    }

    if mime.starts_with("audio/") {
        return Ok(ProbedMedia {
            kind: SourceKind::Audio,
            animated: false,
        });
    }

    Err(ConversionError::probe_rejected(format!(
        "unsupported media type: {:?}",
        input.declared_mime
    )))
}

/// RIFF/WEBP signature.
pub fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

/// Animated WebP: VP8X with the animation flag, or an `ANIM` chunk.
pub fn is_animated_webp(bytes: &[u8]) -> bool {
    if !is_webp(bytes) {
        return false;
    }
    // VP8X flags byte: bit 1 is animation
    if bytes.len() >= 21 && &bytes[12..16] == b"VP8X" && bytes[20] & 0x02 != 0 {
        return true;
    }
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(4).any(|w| w == b"ANIM")
}

/// MP4/MOV (`ftyp` box) or Matroska/WebM (EBML header).
pub fn is_video_container(bytes: &[u8]) -> bool {
    let mp4 = bytes.len() >= 8 && &bytes[4..8] == b"ftyp";
    let ebml = bytes.len() >= 4 && bytes[0..4] == [0x1A, 0x45, 0xDF, 0xA3];
    mp4 || ebml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn media(bytes: &[u8], mime: &str) -> InputMedia {
        InputMedia::new(bytes.to_vec(), mime)
    }

    #[test]
    fn test_static_webp_is_sticker() {
        let probed = classify(&media(&fixtures::static_webp(), "image/webp")).unwrap();
        assert_eq!(probed.kind, SourceKind::Sticker);
        assert!(!probed.animated);
    }

    #[test]
    fn test_animation_flag_marks_sticker_animated() {
        let input = media(&fixtures::static_webp(), "image/webp").with_animated(true);
        let probed = classify(&input).unwrap();
        assert_eq!(probed.kind, SourceKind::Sticker);
        assert!(probed.animated);
    }

    #[test]
    fn test_anim_chunk_marks_sticker_animated() {
        let probed = classify(&media(&fixtures::animated_webp(), "image/webp")).unwrap();
        assert!(probed.animated);
    }

    #[test]
    fn test_sticker_with_video_payload() {
        let probed = classify(&media(&fixtures::mp4_header(), "image/webp")).unwrap();
        assert_eq!(probed.kind, SourceKind::Video);
    }

    #[test]
    fn test_images() {
        for mime in ["image/jpeg", "image/png", "IMAGE/PNG"] {
            let probed = classify(&media(b"\x89PNG....", mime)).unwrap();
            assert_eq!(probed.kind, SourceKind::Image, "{}", mime);
        }
    }

    #[test]
    fn test_gif_is_animated_video() {
        let probed = classify(&media(b"GIF89a....", "image/gif")).unwrap();
        assert_eq!(probed.kind, SourceKind::Video);
        assert!(probed.animated);
    }

    #[test]
    fn test_video_and_audio() {
        assert_eq!(
            classify(&media(b"data", "video/mp4")).unwrap().kind,
            SourceKind::Video
        );
        assert_eq!(
            classify(&media(b"data", "audio/ogg; codecs=opus"))
                .unwrap()
                .kind,
            SourceKind::Audio
        );
    }

    #[test]
    fn test_unknown_mime_rejected() {
        let err = classify(&media(b"data", "application/pdf")).unwrap_err();
        assert!(matches!(err, ConversionError::ProbeRejected { .. }));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = classify(&media(b"", "image/png")).unwrap_err();
        assert!(matches!(err, ConversionError::ProbeRejected { .. }));
    }

    #[test]
    fn test_url_only_input_accepted() {
        let url = "https://example.com/cat.png".parse().unwrap();
        let probed = classify(&InputMedia::from_url(url, "image/png")).unwrap();
        assert_eq!(probed.kind, SourceKind::Image);
    }

    #[test]
    fn test_container_markers() {
        assert!(is_webp(&fixtures::static_webp()));
        assert!(!is_webp(b"RIFF\0\0\0\0WAVE"));
        assert!(is_video_container(&fixtures::mp4_header()));
        assert!(is_video_container(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]));
        assert!(!is_video_container(b"GIF89a"));
    }
}
