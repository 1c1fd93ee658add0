//! WebP sticker container encoding.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use img_parts::webp::WebP;
use img_parts::ImageEXIF;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::EncoderConfig;
use super::error::StickerError;
use super::exif::{decode_exif, encode_exif, StickerMetadata};
use crate::fallback::{tier, with_fallback};
use crate::media::{
    Backend, ConversionError, ConversionOutcome, ConversionRequest, ConvertedMedia, FailureReason,
    InputMedia, SourceKind, StickerLayout, TargetKind,
};
use crate::probe;
use crate::remote::HttpTransport;
use crate::temp::TempScope;
use crate::transcoder::LocalTranscoder;

/// Where the sticker content comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum StickerSource {
    Bytes { bytes: Bytes, mime: String },
    Url { url: Url, mime: String },
}

impl StickerSource {
    /// Bytes when the input carries any, otherwise its URL.
    pub fn from_input(input: &InputMedia) -> Self {
        match (&input.source_url, input.is_empty()) {
            (Some(url), true) => Self::Url {
                url: url.clone(),
                mime: input.declared_mime.clone(),
            },
            _ => Self::Bytes {
                bytes: input.bytes.clone(),
                mime: input.declared_mime.clone(),
            },
        }
    }
}

/// Wraps media into a WebP sticker with pack metadata.
///
/// The rich path re-encodes: stills in-process, animations through the local
/// transcoder. When it fails and the payload already is a WebP, the degraded
/// path only injects the metadata.
pub struct StickerEncoder {
    config: EncoderConfig,
    transcoder: Option<Arc<dyn LocalTranscoder>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl StickerEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            transcoder: None,
            transport: None,
        }
    }

    /// Transcoder used for animated sources.
    pub fn with_transcoder(mut self, transcoder: Arc<dyn LocalTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Transport used to fetch URL sources.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Metadata for a request, filling gaps from configuration.
    pub fn metadata_for(&self, request: &ConversionRequest) -> StickerMetadata {
        let emojis = if request.emojis.is_empty() {
            self.config.default_emojis.clone()
        } else {
            request.emojis.clone()
        };
        StickerMetadata::new(
            Uuid::new_v4().simple().to_string(),
            request
                .pack_name
                .clone()
                .unwrap_or_else(|| self.config.default_pack.clone()),
            request
                .author_name
                .clone()
                .unwrap_or_else(|| self.config.default_author.clone()),
            emojis,
        )
    }

    /// Encodes a sticker. Never returns an empty payload.
    pub async fn encode(
        &self,
        source: StickerSource,
        request: &ConversionRequest,
        scope: &TempScope,
    ) -> ConversionOutcome {
        self.encode_with_local(source, request, scope, self.transcoder.is_some())
            .await
    }

    /// Like [`encode`](Self::encode), with the caller's verdict on the local
    /// transcoder. When `local_available` is false the transcoder is never
    /// invoked and animated sources go straight to metadata injection.
    pub async fn encode_with_local(
        &self,
        source: StickerSource,
        request: &ConversionRequest,
        scope: &TempScope,
        local_available: bool,
    ) -> ConversionOutcome {
        let (bytes, mime) = match source {
            StickerSource::Bytes { bytes, mime } => (bytes, mime),
            StickerSource::Url { url, mime } => {
                let bytes = self.fetch(&url).await.map_err(ConversionError::from)?;
                (bytes, mime)
            }
        };
        if bytes.is_empty() {
            return Err(ConversionError::empty_output("sticker source has no bytes"));
        }

        let metadata = self.metadata_for(request);
        let input = InputMedia::new(bytes.clone(), mime).with_animated(request.animated);
        let (payload, meta) = (&bytes, &metadata);

        let encoded = with_fallback(
            "encoder_rich",
            async {
                self.encode_rich(&input, request, scope, meta, local_available)
                    .await
                    .map_err(ConversionError::from)
            },
            move |rich_err| async move {
                tier("encoder_degraded", async { inject_existing(payload, meta) })
                    .await
                    .map_err(|degraded_err| {
                        let detail = format!("{}; degraded path: {}", rich_err.detail(), degraded_err);
                        match rich_err.reason() {
                            FailureReason::LocalUnavailable => {
                                ConversionError::local_unavailable(detail)
                            }
                            _ => ConversionError::local_failed(detail),
                        }
                    })
            },
        )
        .await?;

        info!(
            scope = %scope.request_id(),
            pack = %metadata.pack_name,
            bytes = encoded.len(),
            "Sticker encoded"
        );
        ConvertedMedia::from_bytes(encoded, TargetKind::Sticker, Backend::Encoder)
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, StickerError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| StickerError::Fetch(format!("no transport to fetch {}", url)))?;
        let response = transport.get(url).await?;
        if !response.is_success() {
            return Err(StickerError::Fetch(format!(
                "HTTP {} from {}",
                response.status, url
            )));
        }
        debug!(%url, bytes = response.body.len(), "Fetched sticker source");
        Ok(response.body)
    }

    async fn encode_rich(
        &self,
        input: &InputMedia,
        request: &ConversionRequest,
        scope: &TempScope,
        metadata: &StickerMetadata,
        local_available: bool,
    ) -> Result<Bytes, StickerError> {
        let probed = probe::classify(input).ok();
        let animated = request.animated || probed.map(|p| p.animated).unwrap_or(false);

        let webp = if animated {
            let transcoder = self.transcoder.as_ref().ok_or(StickerError::NoTranscoder)?;
            if !local_available {
                return Err(StickerError::LocalUnavailable(transcoder.name().to_string()));
            }
            let source = match probed.map(|p| p.kind) {
                Some(SourceKind::Sticker) => SourceKind::Sticker,
                _ => SourceKind::Video,
            };
            let animated_request = ConversionRequest {
                source: Some(source),
                target: TargetKind::Sticker,
                animated: true,
                ..request.clone()
            };
            transcoder
                .transcode(input, &animated_request, scope)
                .await?
        } else {
            self.encode_still(input.bytes.clone(), request).await?
        };

        inject_metadata(webp, metadata)
    }

    async fn encode_still(
        &self,
        bytes: Bytes,
        request: &ConversionRequest,
    ) -> Result<Bytes, StickerError> {
        let size = self.config.canvas_size;
        let quality = self.config.quality_for(request.quality);
        let layout = request.effective_layout();

        tokio::task::spawn_blocking(move || -> Result<Bytes, StickerError> {
            let img = image::load_from_memory(&bytes)?;
            let canvas = fit_canvas(&img, layout, size);
            encode_webp(&canvas.to_rgba8(), quality)
        })
        .await
        .map_err(|e| StickerError::Task(e.to_string()))?
    }
}

/// Lossy libwebp encoding of an RGBA frame.
fn encode_webp(rgba: &RgbaImage, quality: f32) -> Result<Bytes, StickerError> {
    let (width, height) = rgba.dimensions();
    let encoded = webp::Encoder::from_rgba(rgba, width, height)
        .encode_simple(false, quality)
        .map_err(|e| StickerError::Encode(format!("{:?}", e)))?;
    Ok(Bytes::copy_from_slice(&encoded))
}

/// Places `img` on a square canvas according to `layout`.
fn fit_canvas(img: &DynamicImage, layout: StickerLayout, size: u32) -> DynamicImage {
    match layout {
        StickerLayout::Default => img.resize_exact(size, size, FilterType::Lanczos3),
        StickerLayout::Full => {
            let resized = img.resize(size, size, FilterType::Lanczos3);
            let mut canvas =
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0])));
            let x = (size - resized.width()) / 2;
            let y = (size - resized.height()) / 2;
            imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
            canvas
        }
    }
}

/// Sets the EXIF chunk of a WebP, replacing any existing one.
pub fn inject_metadata(webp: Bytes, metadata: &StickerMetadata) -> Result<Bytes, StickerError> {
    let mut container =
        WebP::from_bytes(webp).map_err(|e| StickerError::Container(e.to_string()))?;
    container.set_exif(Some(Bytes::from(encode_exif(metadata)?)));
    Ok(container.encoder().bytes())
}

fn inject_existing(payload: &Bytes, metadata: &StickerMetadata) -> Result<Bytes, StickerError> {
    if !probe::is_webp(payload) {
        return Err(StickerError::Container("payload is not a WebP".to_string()));
    }
    inject_metadata(payload.clone(), metadata)
}

/// Reads sticker metadata back from a WebP.
pub fn read_metadata(bytes: &[u8]) -> Option<StickerMetadata> {
    let container = WebP::from_bytes(Bytes::copy_from_slice(bytes)).ok()?;
    let exif = container.exif()?;
    decode_exif(&exif)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::QualityTier;
    use crate::temp::TempWorkspace;
    use crate::testing::{fixtures, MockTransport, SpyTranscoder};
    use image::GenericImageView;
    use tempfile::TempDir;

    fn request() -> ConversionRequest {
        ConversionRequest::new(TargetKind::Sticker)
            .with_pack("Cats")
            .with_author("Tom")
    }

    fn bytes_source(bytes: Vec<u8>, mime: &str) -> StickerSource {
        StickerSource::Bytes {
            bytes: Bytes::from(bytes),
            mime: mime.to_string(),
        }
    }

    #[tokio::test]
    async fn test_still_png_is_reencoded_with_metadata() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let encoder = StickerEncoder::new(EncoderConfig::default());

        let media = encoder
            .encode(bytes_source(fixtures::png(40, 20), "image/png"), &request(), &scope)
            .await
            .unwrap();

        assert_eq!(media.backend(), Backend::Encoder);
        let bytes = media.bytes().unwrap();
        assert!(probe::is_webp(bytes));
        let meta = read_metadata(bytes).unwrap();
        assert_eq!(meta.pack_name, "Cats");
        assert_eq!(meta.publisher, "Tom");

        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!(decoded.dimensions(), (512, 512));
    }

    #[tokio::test]
    async fn test_defaults_fill_missing_pack_and_author() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let config = EncoderConfig {
            default_pack: "Bot Pack".to_string(),
            default_author: "Bot".to_string(),
            default_emojis: vec!["🤖".to_string()],
            ..EncoderConfig::default()
        };
        let encoder = StickerEncoder::new(config);

        let media = encoder
            .encode(
                bytes_source(fixtures::png(8, 8), "image/png"),
                &ConversionRequest::new(TargetKind::Sticker),
                &scope,
            )
            .await
            .unwrap();

        let meta = read_metadata(media.bytes().unwrap()).unwrap();
        assert_eq!(meta.pack_name, "Bot Pack");
        assert_eq!(meta.publisher, "Bot");
        assert_eq!(meta.emojis, vec!["🤖".to_string()]);
        assert_eq!(meta.pack_id.len(), 32);
    }

    #[test]
    fn test_webp_encoding_error_is_returned() {
        let frame = RgbaImage::from_pixel(8, 8, Rgba([0, 128, 255, 255]));
        assert!(probe::is_webp(&encode_webp(&frame, 80.0).unwrap()));

        // Wider than libwebp's 16383 pixel limit
        let too_wide = RgbaImage::from_pixel(16_384, 1, Rgba([0, 0, 0, 255]));
        let err = encode_webp(&too_wide, 80.0).unwrap_err();
        assert!(matches!(err, StickerError::Encode(_)));
        assert_eq!(
            ConversionError::from(err).reason(),
            FailureReason::LocalFailed
        );
    }

    #[test]
    fn test_full_layout_pads_with_transparency() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 50, Rgba([255, 0, 0, 255])));
        let canvas = fit_canvas(&img, StickerLayout::Full, 512);

        assert_eq!(canvas.dimensions(), (512, 512));
        assert_eq!(canvas.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(canvas.get_pixel(256, 256)[3], 255);

        let stretched = fit_canvas(&img, StickerLayout::Default, 512);
        assert_eq!(stretched.get_pixel(0, 0)[3], 255);
    }

    #[tokio::test]
    async fn test_animated_source_goes_through_transcoder() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let transcoder = SpyTranscoder::succeeding(fixtures::static_webp());
        let encoder =
            StickerEncoder::new(EncoderConfig::default()).with_transcoder(Arc::new(transcoder.clone()));

        let media = encoder
            .encode(
                bytes_source(fixtures::mp4_header(), "video/mp4"),
                &request().with_animated(true),
                &scope,
            )
            .await
            .unwrap();

        assert_eq!(transcoder.invocations().await, 1);
        let seen = transcoder.last_request().await.unwrap();
        assert_eq!(seen.target, TargetKind::Sticker);
        assert_eq!(seen.source, Some(SourceKind::Video));
        assert_eq!(seen.effective_layout(), StickerLayout::Full);
        assert_eq!(read_metadata(media.bytes().unwrap()).unwrap().pack_name, "Cats");
    }

    #[tokio::test]
    async fn test_unavailable_transcoder_is_not_invoked() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let transcoder = SpyTranscoder::succeeding(fixtures::static_webp());
        let encoder =
            StickerEncoder::new(EncoderConfig::default()).with_transcoder(Arc::new(transcoder.clone()));

        let media = encoder
            .encode_with_local(
                bytes_source(fixtures::animated_webp(), "image/webp"),
                &request().with_animated(true),
                &scope,
                false,
            )
            .await
            .unwrap();
        assert_eq!(read_metadata(media.bytes().unwrap()).unwrap().pack_name, "Cats");

        let err = encoder
            .encode_with_local(
                bytes_source(fixtures::mp4_header(), "video/mp4"),
                &request().with_animated(true),
                &scope,
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::LocalUnavailable);
        assert_eq!(transcoder.invocations().await, 0);
    }

    #[tokio::test]
    async fn test_degraded_path_keeps_webp_payload() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        // No transcoder: the animated rich path cannot run
        let encoder = StickerEncoder::new(EncoderConfig::default());

        let media = encoder
            .encode(
                bytes_source(fixtures::animated_webp(), "image/webp"),
                &request(),
                &scope,
            )
            .await
            .unwrap();

        let bytes = media.bytes().unwrap();
        assert!(probe::is_animated_webp(bytes));
        assert_eq!(read_metadata(bytes).unwrap().publisher, "Tom");
    }

    #[tokio::test]
    async fn test_both_paths_fail_for_non_webp() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let encoder = StickerEncoder::new(EncoderConfig::default());

        let err = encoder
            .encode(bytes_source(b"not an image".to_vec(), "image/png"), &request(), &scope)
            .await
            .unwrap_err();

        assert_eq!(err.reason(), FailureReason::LocalFailed);
        assert!(err.detail().contains("degraded path"));
    }

    #[tokio::test]
    async fn test_empty_source() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let encoder = StickerEncoder::new(EncoderConfig::default());

        let err = encoder
            .encode(bytes_source(Vec::new(), "image/png"), &request(), &scope)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::EmptyOutput);
    }

    #[tokio::test]
    async fn test_url_source_is_fetched() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let transport = MockTransport::new();
        transport
            .respond("https://cdn.example.com/cat.png", 200, Bytes::from(fixtures::png(16, 16)))
            .await;
        let encoder =
            StickerEncoder::new(EncoderConfig::default()).with_transport(Arc::new(transport.clone()));

        let source = StickerSource::Url {
            url: "https://cdn.example.com/cat.png".parse().unwrap(),
            mime: "image/png".to_string(),
        };
        let media = encoder.encode(source, &request(), &scope).await.unwrap();

        assert!(probe::is_webp(media.bytes().unwrap()));
        assert_eq!(transport.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_url_fetch_failure_is_remote() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let transport = MockTransport::new();
        let encoder =
            StickerEncoder::new(EncoderConfig::default()).with_transport(Arc::new(transport));

        let source = StickerSource::Url {
            url: "https://cdn.example.com/missing.png".parse().unwrap(),
            mime: "image/png".to_string(),
        };
        let err = encoder.encode(source, &request(), &scope).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::RemoteFailed);
    }

    #[tokio::test]
    async fn test_degraded_quality_still_encodes() {
        let dir = TempDir::new().unwrap();
        let scope = TempWorkspace::new(dir.path()).scope("req");
        let encoder = StickerEncoder::new(EncoderConfig::default());

        let media = encoder
            .encode(
                bytes_source(fixtures::png(30, 30), "image/png"),
                &request().with_quality(QualityTier::Degraded),
                &scope,
            )
            .await
            .unwrap();
        assert!(probe::is_webp(media.bytes().unwrap()));
    }

    #[test]
    fn test_source_from_input() {
        let url: Url = "https://cdn.example.com/a.webp".parse().unwrap();
        let from_url = StickerSource::from_input(&InputMedia::from_url(url.clone(), "image/webp"));
        assert!(matches!(from_url, StickerSource::Url { .. }));

        let from_bytes = StickerSource::from_input(&InputMedia::new(vec![1u8], "image/webp"));
        assert!(matches!(from_bytes, StickerSource::Bytes { .. }));
    }

    #[test]
    fn test_read_metadata_without_exif() {
        assert_eq!(read_metadata(&fixtures::static_webp()), None);
        assert_eq!(read_metadata(b"garbage"), None);
    }
}
