//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::capabilities::EncoderCapabilities;
use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::{LocalTranscoder, TranscodeRoute};
use crate::media::{ConversionRequest, InputMedia, SourceKind, StickerLayout};
use crate::probe;
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::temp::TempScope;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder that spawns real processes.
    pub fn new(config: TranscoderConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner::new()))
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Creates a transcoder over a custom process runner.
    pub fn with_runner(config: TranscoderConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds the complete ffmpeg argument list for a route.
    pub fn build_args(
        &self,
        route: TranscodeRoute,
        input: &str,
        output: &Path,
        request: &ConversionRequest,
        duration_secs: Option<f64>,
    ) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string(),
        ];

        match route {
            TranscodeRoute::AnimationToVideo => self.push_video_args(&mut args, request),
            TranscodeRoute::AudioToVideo => {
                self.push_audio_args(&mut args, request, duration_secs)
            }
            TranscodeRoute::FirstFrameToImage => self.push_image_args(&mut args),
            TranscodeRoute::ToWebpSticker => self.push_webp_args(&mut args, request),
        }

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());
        args
    }

    fn push_video_args(&self, args: &mut Vec<String>, request: &ConversionRequest) {
        let size = self.config.frame_size;
        args.extend([
            "-vf".to_string(),
            format!("scale={}:{}:flags=lanczos", size, size),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.x264_preset.clone(),
            "-crf".to_string(),
            self.config.crf(request.quality).to_string(),
            // Most players refuse yuv444 H.264
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);
    }

    fn push_audio_args(
        &self,
        args: &mut Vec<String>,
        request: &ConversionRequest,
        duration_secs: Option<f64>,
    ) {
        let size = self.config.frame_size;
        let canvas = match duration_secs {
            Some(d) => format!("color=c=black:s={}x{}:r=1:d={}[v]", size, size, d),
            None => format!("color=c=black:s={}x{}:r=1[v]", size, size),
        };
        args.extend([
            "-filter_complex".to_string(),
            canvas,
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "0:a".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-crf".to_string(),
            self.config.crf(request.quality).to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-shortest".to_string(),
        ]);
    }

    fn push_image_args(&self, args: &mut Vec<String>) {
        let size = self.config.frame_size;
        args.extend([
            "-vframes".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", size, size),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
        ]);
    }

    fn push_webp_args(&self, args: &mut Vec<String>, request: &ConversionRequest) {
        let size = self.config.frame_size;
        let fps = self.config.sticker_fps;
        let filter = match request.effective_layout() {
            StickerLayout::Full => format!(
                "scale={s}:{s}:force_original_aspect_ratio=decrease,fps={fps},format=rgba,\
                 pad={s}:{s}:(ow-iw)/2:(oh-ih)/2:color=#00000000",
                s = size,
                fps = fps
            ),
            StickerLayout::Default => {
                format!("scale={s}:{s}:flags=lanczos,fps={fps}", s = size, fps = fps)
            }
        };
        args.extend([
            "-vf".to_string(),
            filter,
            "-vcodec".to_string(),
            "libwebp".to_string(),
            "-lossless".to_string(),
            "0".to_string(),
            "-q:v".to_string(),
            self.config.webp_quality(request.quality).to_string(),
            "-loop".to_string(),
            "0".to_string(),
            "-preset".to_string(),
            "default".to_string(),
            "-an".to_string(),
            "-vsync".to_string(),
            "0".to_string(),
        ]);
    }

    /// Stages the input for ffmpeg: a working file, or the URL itself when the
    /// caller only handed over a locator.
    async fn stage_input(
        &self,
        input: &InputMedia,
        source: SourceKind,
        scope: &TempScope,
    ) -> Result<String, TranscodeError> {
        if input.is_empty() {
            if let Some(url) = &input.source_url {
                return Ok(url.to_string());
            }
        }
        let extension = input_extension(&input.declared_mime, source);
        let file = scope.write(extension, &input.bytes).await?;
        Ok(file.path().to_string_lossy().to_string())
    }
}

/// File extension for the staged input, so ffmpeg's demuxer probing gets a hint.
pub fn input_extension(mime: &str, source: SourceKind) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("webp") {
        "webp"
    } else if mime.contains("gif") {
        "gif"
    } else if mime.contains("png") {
        "png"
    } else if mime.contains("jpeg") || mime.contains("jpg") {
        "jpg"
    } else if mime.contains("webm") {
        "webm"
    } else if mime.contains("quicktime") {
        "mov"
    } else if mime.contains("ogg") || mime.contains("opus") {
        "ogg"
    } else if mime.contains("mpeg") && source == SourceKind::Audio {
        "mp3"
    } else if mime.contains("mp4") && source == SourceKind::Audio {
        "m4a"
    } else {
        source.extension()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeReport {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    // ffprobe prints numbers as strings
    duration: Option<String>,
}

/// Duration from `ffprobe -print_format json -show_format` output.
pub fn parse_ffprobe_duration(stdout: &[u8]) -> Option<f64> {
    let report: FfprobeReport = serde_json::from_slice(stdout).ok()?;
    let duration: f64 = report.format.duration?.trim().parse().ok()?;
    (duration.is_finite() && duration >= 0.0).then_some(duration)
}

/// Checks the container signature of a route's output.
fn validate_output(route: TranscodeRoute, bytes: &[u8]) -> Result<(), TranscodeError> {
    let valid = match route {
        TranscodeRoute::AnimationToVideo | TranscodeRoute::AudioToVideo => {
            probe::is_video_container(bytes)
        }
        TranscodeRoute::FirstFrameToImage => bytes.starts_with(&PNG_SIGNATURE),
        TranscodeRoute::ToWebpSticker => probe::is_webp(bytes),
    };
    if valid {
        Ok(())
    } else {
        Err(TranscodeError::InvalidOutput {
            reason: format!("output is not a valid {}", route.output().extension()),
        })
    }
}

#[async_trait]
impl LocalTranscoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe_availability(&self) -> bool {
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        match self
            .runner
            .run(&self.config.ffmpeg_path, &["-version".to_string()], timeout)
            .await
        {
            Ok(output) if output.success() => true,
            Ok(output) => {
                warn!(
                    exit_code = ?output.exit_code,
                    "ffmpeg -version exited unsuccessfully"
                );
                false
            }
            Err(e) => {
                debug!(error = %e, "ffmpeg not available");
                false
            }
        }
    }

    async fn encoders(&self) -> Option<EncoderCapabilities> {
        Some(EncoderCapabilities::detect(self.runner.as_ref(), &self.config).await)
    }

    async fn measure_duration(&self, input: &InputMedia, scope: &TempScope) -> Option<f64> {
        let source = probe::classify(input).map(|p| p.kind).unwrap_or(SourceKind::Video);
        let staged = match self.stage_input(input, source, scope).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "Failed to stage input for ffprobe");
                return None;
            }
        };
        let args = [
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            staged,
        ];
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);

        match self
            .runner
            .run(&self.config.ffprobe_path, &args, timeout)
            .await
        {
            Ok(output) if output.success() => {
                let duration = parse_ffprobe_duration(&output.stdout);
                debug!(scope = %scope.request_id(), duration = ?duration, "ffprobe finished");
                duration
            }
            Ok(output) => {
                debug!(exit_code = ?output.exit_code, "ffprobe could not read the input");
                None
            }
            Err(e) => {
                debug!(error = %e, "ffprobe not available");
                None
            }
        }
    }

    async fn transcode(
        &self,
        input: &InputMedia,
        request: &ConversionRequest,
        scope: &TempScope,
    ) -> Result<Bytes, TranscodeError> {
        let start = Instant::now();

        let source = match request.source {
            Some(source) => source,
            None => probe::classify(input)
                .map(|p| p.kind)
                .map_err(|_| TranscodeError::UnknownSource {
                    mime: input.declared_mime.clone(),
                })?,
        };
        let route = TranscodeRoute::resolve(source, request.target).ok_or(
            TranscodeError::Unsupported {
                from: source,
                target: request.target,
            },
        )?;

        let staged = self.stage_input(input, source, scope).await?;
        let output = scope.acquire(route.output().extension()).await?;
        let args = self.build_args(route, &staged, output.path(), request, input.duration_seconds);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result = self
            .runner
            .run(&self.config.ffmpeg_path, &args, timeout)
            .await?;

        if !result.success() {
            return Err(TranscodeError::Failed {
                exit_code: result.exit_code,
                stderr: result.stderr_lossy(),
            });
        }

        let bytes = match tokio::fs::read(output.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscodeError::EmptyOutput)
            }
            Err(e) => return Err(TranscodeError::Io(e)),
        };
        if bytes.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }
        validate_output(route, &bytes)?;

        debug!(
            scope = %scope.request_id(),
            route = ?route,
            quality = ?request.quality,
            output_bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );

        Ok(Bytes::from(bytes))
    }
}
