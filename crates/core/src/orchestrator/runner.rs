//! Conversion orchestrator implementation.
//!
//! Drives one request through the state machine:
//! - **Received**: duration cap, before anything touches disk or network
//! - **Probed**: classification gates the branch, rejection is terminal. An
//!   animation sent without a duration is measured locally and capped here
//! - **LocalAttempt**: ffmpeg, with one degraded retry on a transient failure
//! - **RemoteAttempt**: web-form fallback, its failure is terminal
//!
//! Sticker targets go to the [`StickerEncoder`] instead, which has its own
//! rich/degraded tiers and never touches an unavailable transcoder.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::fallback::{tier, with_fallback};
use crate::media::{
    Backend, ConversionError, ConversionOutcome, ConversionRequest, ConvertedMedia, InputMedia,
    QualityTier, SourceKind, TargetKind,
};
use crate::metrics::{CONVERSIONS_TOTAL, CONVERSION_DURATION};
use crate::probe;
use crate::remote::{
    FormScrapeConverter, RemoteConverter, RemoteTarget, ReqwestTransport, TransportError,
};
use crate::sticker::{StickerEncoder, StickerSource};
use crate::temp::{TempScope, TempWorkspace};
use crate::transcoder::{FfmpegTranscoder, LocalTranscoder, TranscodeError, TranscodeRoute};

use super::config::OrchestratorConfig;
use super::types::{Capabilities, RequestStage, StageCell};

/// Whether the declared input is an animation, before any probing.
fn looks_animated(input: &InputMedia, request: &ConversionRequest) -> bool {
    let mime = input.declared_mime.to_ascii_lowercase();
    request.animated || input.animated || mime.starts_with("video/") || mime == "image/gif"
}

/// The conversion orchestrator: single entry point for callers.
pub struct ConversionOrchestrator {
    config: OrchestratorConfig,
    workspace: TempWorkspace,
    transcoder: Arc<dyn LocalTranscoder>,
    remote: Option<Arc<dyn RemoteConverter>>,
    encoder: StickerEncoder,
    download_results: bool,
    reprobe_availability: bool,

    // Runtime state
    availability: OnceCell<bool>,
    limiter: Option<Arc<Semaphore>>,
}

impl ConversionOrchestrator {
    /// Create a new orchestrator. `remote` is `None` when the fallback is disabled.
    pub fn new(
        config: OrchestratorConfig,
        workspace: TempWorkspace,
        transcoder: Arc<dyn LocalTranscoder>,
        remote: Option<Arc<dyn RemoteConverter>>,
        encoder: StickerEncoder,
    ) -> Self {
        let limiter = match config.max_concurrent_requests {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Self {
            config,
            workspace,
            transcoder,
            remote,
            encoder,
            download_results: true,
            reprobe_availability: false,
            availability: OnceCell::new(),
            limiter,
        }
    }

    /// Wire the production adapters from configuration.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config.remote)?);
        let transcoder: Arc<dyn LocalTranscoder> =
            Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));

        let remote: Option<Arc<dyn RemoteConverter>> = if config.remote.enabled {
            Some(Arc::new(FormScrapeConverter::new(
                &config.remote,
                transport.clone(),
            )))
        } else {
            None
        };

        let encoder = StickerEncoder::new(config.sticker.clone())
            .with_transcoder(transcoder.clone())
            .with_transport(transport);

        Ok(Self::new(
            config.orchestrator.clone(),
            TempWorkspace::from_config(&config.workspace),
            transcoder,
            remote,
            encoder,
        )
        .with_download_results(config.remote.download_results)
        .with_reprobe_availability(config.transcoder.reprobe_availability))
    }

    /// Return remote results as bytes (`true`) or as locators.
    pub fn with_download_results(mut self, download: bool) -> Self {
        self.download_results = download;
        self
    }

    /// Probe ffmpeg on every request instead of once.
    pub fn with_reprobe_availability(mut self, reprobe: bool) -> Self {
        self.reprobe_availability = reprobe;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current capabilities. Probes the local transcoder if not done yet.
    pub async fn capabilities(&self) -> Capabilities {
        let local_transcoder = self.local_available().await;
        let encoders = if local_transcoder {
            self.transcoder.encoders().await
        } else {
            None
        };
        Capabilities {
            local_transcoder,
            remote_fallback: self.remote.is_some(),
            encoders,
        }
    }

    /// Converts `input` to `request.target`.
    pub async fn convert(&self, input: InputMedia, request: ConversionRequest) -> ConversionOutcome {
        let _permit = self.acquire_slot().await;
        let request_id = Uuid::new_v4().to_string();
        let target = request.target;
        let start = Instant::now();

        info!(
            request_id = %request_id,
            target = %target,
            mime = %input.declared_mime,
            bytes = input.bytes.len(),
            "Conversion requested"
        );

        let scope = self.workspace.scope(request_id.clone());
        let stage = StageCell::new();
        let deadline = Duration::from_secs(self.config.request_timeout_secs);

        let result = match timeout(deadline, self.run(&input, request, &scope, &stage)).await {
            Ok(result) => result,
            Err(_) => {
                let stage = stage.get();
                warn!(request_id = %request_id, stage = %stage, "Request deadline exceeded");
                Err(stage.deadline_error(self.config.request_timeout_secs))
            }
        };

        scope.release().await;
        self.record(&request_id, target, &result, start);
        result
    }

    /// Wraps `input` into a sticker; the request target is forced to sticker.
    pub async fn encode_sticker(
        &self,
        input: InputMedia,
        request: ConversionRequest,
    ) -> ConversionOutcome {
        let request = ConversionRequest {
            target: TargetKind::Sticker,
            ..request
        };
        self.convert(input, request).await
    }

    async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limiter {
            // The semaphore is never closed
            Some(limiter) => limiter.clone().acquire_owned().await.ok(),
            None => None,
        }
    }

    async fn local_available(&self) -> bool {
        if self.reprobe_availability {
            return self.transcoder.probe_availability().await;
        }
        *self
            .availability
            .get_or_init(|| self.transcoder.probe_availability())
            .await
    }

    async fn run(
        &self,
        input: &InputMedia,
        mut request: ConversionRequest,
        scope: &TempScope,
        stage: &StageCell,
    ) -> ConversionOutcome {
        stage.set(RequestStage::Received);
        self.check_duration(input.duration_seconds, looks_animated(input, &request))?;

        // The encoder reports an empty source as empty output, not as bad input
        if request.target == TargetKind::Sticker && input.is_empty() && input.source_url.is_none() {
            return Err(ConversionError::empty_output("sticker source has no bytes"));
        }

        let probed = probe::classify(input)?;
        let source = *request.source.get_or_insert(probed.kind);
        request.animated |= probed.animated;
        stage.set(RequestStage::Probed);
        debug!(scope = %scope.request_id(), source = %source, animated = request.animated, "Probed");

        if request.target == TargetKind::Sticker {
            if source == SourceKind::Audio {
                return Err(ConversionError::probe_rejected("audio cannot become a sticker"));
            }
        } else if TranscodeRoute::resolve(source, request.target).is_none() {
            return Err(ConversionError::probe_rejected(format!(
                "cannot convert {} to {}",
                source, request.target
            )));
        }

        // Still stickers are encoded in-process
        let needs_local = request.target != TargetKind::Sticker || request.animated;
        let local_available = needs_local && self.local_available().await;
        if local_available
            && request.animated
            && source != SourceKind::Audio
            && input.duration_seconds.is_none()
        {
            let measured = self.transcoder.measure_duration(input, scope).await;
            debug!(scope = %scope.request_id(), duration = ?measured, "Measured input duration");
            self.check_duration(measured, true)?;
        }

        if request.target == TargetKind::Sticker {
            stage.set(RequestStage::Encoding);
            return self
                .encoder
                .encode_with_local(StickerSource::from_input(input), &request, scope, local_available)
                .await;
        }

        let local_err = if local_available {
            stage.set(RequestStage::LocalAttempt);
            match self.attempt_local(input, &request, scope).await {
                Ok(media) => return Ok(media),
                Err(err) => err,
            }
        } else {
            info!(scope = %scope.request_id(), "Local transcoder unavailable, going remote");
            ConversionError::local_unavailable(format!(
                "{} did not respond to a version probe",
                self.transcoder.name()
            ))
        };

        stage.set(RequestStage::RemoteAttempt);
        self.attempt_remote(input, source, request.target, local_err)
            .await
    }

    /// Rejects animations longer than the configured cap. Unknown durations pass.
    fn check_duration(&self, duration: Option<f64>, animated: bool) -> Result<(), ConversionError> {
        match duration {
            Some(duration) if animated && duration > self.config.max_animated_duration_secs => {
                Err(ConversionError::DurationExceeded {
                    duration_secs: duration,
                    max_secs: self.config.max_animated_duration_secs,
                })
            }
            _ => Ok(()),
        }
    }

    /// Local tier: requested quality first, one degraded retry on a transient failure.
    async fn attempt_local(
        &self,
        input: &InputMedia,
        request: &ConversionRequest,
        scope: &TempScope,
    ) -> ConversionOutcome {
        let retry = self.config.degraded_retry && request.quality == QualityTier::High;
        let degraded = request.degraded();

        let bytes = with_fallback(
            "local",
            self.transcoder.transcode(input, request, scope),
            |err: TranscodeError| async move {
                if !(retry && err.is_transient()) {
                    return Err(err);
                }
                info!(scope = %scope.request_id(), "Retrying locally at degraded quality");
                tier(
                    "local_degraded",
                    self.transcoder.transcode(input, &degraded, scope),
                )
                .await
            },
        )
        .await
        .map_err(ConversionError::from)?;

        ConvertedMedia::from_bytes(bytes, request.target, Backend::Local)
    }

    /// Remote tier. Without a remote converter the local failure stands.
    async fn attempt_remote(
        &self,
        input: &InputMedia,
        source: SourceKind,
        target: TargetKind,
        local_err: ConversionError,
    ) -> ConversionOutcome {
        let Some(remote) = &self.remote else {
            debug!("Remote fallback disabled");
            return Err(local_err);
        };
        let Some(route) = RemoteTarget::for_pair(source, target) else {
            return Err(ConversionError::remote_failed(format!(
                "no remote route for {} to {}; local: {}",
                source,
                target,
                local_err.detail()
            )));
        };

        let result = tier("remote", async {
            let locator = remote
                .convert(input, route)
                .await
                .map_err(ConversionError::from)?;
            if !self.download_results {
                return Ok(ConvertedMedia::from_locator(locator, target));
            }
            let bytes = remote
                .download(&locator)
                .await
                .map_err(ConversionError::from)?;
            ConvertedMedia::from_bytes(bytes, target, Backend::Remote)
        })
        .await;

        result.map_err(|err| {
            ConversionError::remote_failed(format!(
                "{}; local: {}",
                err.detail(),
                local_err.detail()
            ))
        })
    }

    fn record(&self, request_id: &str, target: TargetKind, result: &ConversionOutcome, start: Instant) {
        let elapsed = start.elapsed();
        CONVERSION_DURATION
            .with_label_values(&[target.as_str()])
            .observe(elapsed.as_secs_f64());

        match result {
            Ok(media) => {
                CONVERSIONS_TOTAL
                    .with_label_values(&[target.as_str(), "success"])
                    .inc();
                info!(
                    request_id = %request_id,
                    backend = media.backend().as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion succeeded"
                );
            }
            Err(err) => {
                CONVERSIONS_TOTAL
                    .with_label_values(&[target.as_str(), err.reason().as_str()])
                    .inc();
                warn!(
                    request_id = %request_id,
                    reason = %err.reason(),
                    detail = %err.detail(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion failed"
                );
            }
        }
    }
}
