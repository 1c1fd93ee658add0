//! Conversion and sticker endpoints.
//!
//! All three endpoints take a multipart form. The media goes in `file`; the
//! remaining fields describe the request:
//!
//! | field      | meaning                                          |
//! |------------|--------------------------------------------------|
//! | `mime`     | declared mime type (defaults to the part's type) |
//! | `url`      | source URL when no `file` is sent                |
//! | `target`   | `image`, `video` or `sticker`                    |
//! | `animated` | `true`/`false`                                   |
//! | `quality`  | `high` or `degraded`                             |
//! | `duration` | source duration in seconds                       |
//! | `pack`     | sticker pack name                                |
//! | `author`   | sticker author                                   |
//! | `layout`   | `default` or `full`                              |
//! | `emojis`   | comma separated                                  |

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use stickerline_core::{
    read_metadata, ConversionError, ConversionRequest, ConvertedMedia, FailureReason, InputMedia,
    MediaPayload, QualityTier, StickerLayout, StickerMetadata, TargetKind, Url,
};

use crate::metrics::UPLOAD_BYTES;
use crate::state::AppState;

/// Response header naming the backend that produced the payload.
pub const BACKEND_HEADER: HeaderName = HeaderName::from_static("x-stickerline-backend");

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Failure reason code, present for conversion failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Returned instead of bytes when remote results are not downloaded.
#[derive(Debug, Serialize)]
pub struct LocatorResponse {
    pub locator: String,
    pub target: &'static str,
    pub backend: &'static str,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
            reason: None,
        }),
    )
}

fn multipart_error(err: MultipartError) -> ApiError {
    (
        err.status(),
        Json(ErrorResponse {
            error: err.body_text(),
            reason: None,
        }),
    )
}

/// Map a conversion failure to its HTTP status.
///
/// Failures caused by the input are 422, failures of a backend are 502.
pub fn conversion_status(reason: FailureReason) -> StatusCode {
    match reason {
        FailureReason::ProbeRejected
        | FailureReason::DurationExceeded
        | FailureReason::EmptyOutput => StatusCode::UNPROCESSABLE_ENTITY,
        FailureReason::LocalUnavailable
        | FailureReason::LocalFailed
        | FailureReason::RemoteFailed => StatusCode::BAD_GATEWAY,
    }
}

fn conversion_error(err: ConversionError) -> ApiError {
    let reason = err.reason();
    (
        conversion_status(reason),
        Json(ErrorResponse {
            error: err.to_string(),
            reason: Some(reason.as_str()),
        }),
    )
}

/// Parsed multipart form.
#[derive(Debug, Default)]
struct ConvertForm {
    file: Option<Bytes>,
    file_mime: Option<String>,
    mime: Option<String>,
    url: Option<Url>,
    target: Option<TargetKind>,
    animated: Option<bool>,
    quality: Option<QualityTier>,
    duration: Option<f64>,
    pack: Option<String>,
    author: Option<String>,
    layout: Option<StickerLayout>,
    emojis: Vec<String>,
}

impl ConvertForm {
    async fn parse(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    form.file_mime = field
                        .content_type()
                        .filter(|m| *m != FALLBACK_MIME)
                        .map(|m| m.to_string());
                    form.file = Some(field.bytes().await.map_err(multipart_error)?);
                }
                "mime" => form.mime = text(field).await?,
                "url" => {
                    if let Some(raw) = text(field).await? {
                        form.url = Some(
                            Url::parse(&raw).map_err(|e| bad_request(format!("invalid url: {}", e)))?,
                        );
                    }
                }
                "target" => form.target = parsed(field, "target").await?,
                "quality" => form.quality = parsed(field, "quality").await?,
                "layout" => form.layout = parsed(field, "layout").await?,
                "animated" => {
                    if let Some(raw) = text(field).await? {
                        form.animated = Some(parse_bool(&raw).ok_or_else(|| {
                            bad_request(format!("invalid animated flag: {}", raw))
                        })?);
                    }
                }
                "duration" => {
                    if let Some(raw) = text(field).await? {
                        form.duration = Some(parse_duration(&raw).ok_or_else(|| {
                            bad_request(format!("invalid duration: {}", raw))
                        })?);
                    }
                }
                "pack" => form.pack = text(field).await?,
                "author" => form.author = text(field).await?,
                "emojis" => {
                    if let Some(raw) = text(field).await? {
                        form.emojis = split_emojis(&raw);
                    }
                }
                _ => debug!(field = %name, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// Build the pipeline inputs. `forced_target` overrides the form's target.
    fn into_parts(
        self,
        forced_target: Option<TargetKind>,
    ) -> Result<(InputMedia, ConversionRequest), ApiError> {
        let target = forced_target
            .or(self.target)
            .ok_or_else(|| bad_request("missing target field"))?;
        let mime = self
            .mime
            .or(self.file_mime)
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let mut input = match (self.file, self.url) {
            // An empty file part next to a URL is a blank file picker
            (Some(bytes), Some(url)) if bytes.is_empty() => InputMedia::from_url(url, mime),
            (Some(bytes), _) => InputMedia::new(bytes, mime),
            (None, Some(url)) => InputMedia::from_url(url, mime),
            (None, None) => return Err(bad_request("missing file or url field")),
        };
        if let Some(duration) = self.duration {
            input = input.with_duration(duration);
        }

        let animated = self.animated.unwrap_or(false);
        input = input.with_animated(animated);

        let mut request = ConversionRequest::new(target)
            .with_animated(animated)
            .with_quality(self.quality.unwrap_or_default())
            .with_emojis(self.emojis);
        if let Some(pack) = self.pack {
            request = request.with_pack(pack);
        }
        if let Some(author) = self.author {
            request = request.with_author(author);
        }
        if let Some(layout) = self.layout {
            request = request.with_layout(layout);
        }

        Ok((input, request))
    }

    fn upload_size(&self) -> usize {
        self.file.as_ref().map(|b| b.len()).unwrap_or(0)
    }
}

async fn text(field: Field<'_>) -> Result<Option<String>, ApiError> {
    let value = field.text().await.map_err(multipart_error)?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

async fn parsed<T>(field: Field<'_>, name: &str) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = String>,
{
    match text(field).await? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| bad_request(format!("invalid {}: {}", name, e))),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn split_emojis(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

fn media_response(media: ConvertedMedia) -> Response {
    let target = media.target();
    let backend = media.backend();

    match media.into_payload() {
        MediaPayload::Bytes(bytes) => (
            [
                (header::CONTENT_TYPE, target.mime_type()),
                (BACKEND_HEADER, backend.as_str()),
            ],
            bytes,
        )
            .into_response(),
        MediaPayload::Locator(url) => Json(LocatorResponse {
            locator: url.to_string(),
            target: target.as_str(),
            backend: backend.as_str(),
        })
        .into_response(),
    }
}

/// Convert an uploaded file (or URL) to the requested target.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = ConvertForm::parse(multipart).await?;
    UPLOAD_BYTES
        .with_label_values(&["convert"])
        .observe(form.upload_size() as f64);

    let (input, request) = form.into_parts(None)?;
    let media = state
        .orchestrator()
        .convert(input, request)
        .await
        .map_err(conversion_error)?;

    Ok(media_response(media))
}

/// Turn an uploaded file (or URL) into a WebP sticker with metadata.
pub async fn create_sticker(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = ConvertForm::parse(multipart).await?;
    UPLOAD_BYTES
        .with_label_values(&["stickers"])
        .observe(form.upload_size() as f64);

    let (input, request) = form.into_parts(Some(TargetKind::Sticker))?;
    let media = state
        .orchestrator()
        .encode_sticker(input, request)
        .await
        .map_err(conversion_error)?;

    Ok(media_response(media))
}

/// Decode the metadata embedded in an uploaded sticker.
pub async fn inspect_sticker(multipart: Multipart) -> Result<Json<StickerMetadata>, ApiError> {
    let form = ConvertForm::parse(multipart).await?;
    let bytes = form.file.ok_or_else(|| bad_request("missing file field"))?;

    read_metadata(&bytes).map(Json).ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "no sticker metadata found".to_string(),
                reason: None,
            }),
        )
    })
}
