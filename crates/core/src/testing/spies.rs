//! Spy backends for orchestrator and encoder tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::media::{ConversionRequest, InputMedia, QualityTier};
use crate::remote::{RemoteConverter, RemoteError, RemoteTarget};
use crate::temp::TempScope;
use crate::transcoder::{LocalTranscoder, TranscodeError};

#[derive(Debug, Clone)]
enum SpyOutcome {
    Bytes(Bytes),
    Error(String),
    Unavailable,
}

/// [`LocalTranscoder`] that records every request instead of spawning ffmpeg.
///
/// Queued failures are returned first, then the configured outcome.
#[derive(Debug, Clone)]
pub struct SpyTranscoder {
    outcome: SpyOutcome,
    failures: Arc<RwLock<VecDeque<TranscodeError>>>,
    requests: Arc<RwLock<Vec<ConversionRequest>>>,
    probes: Arc<RwLock<usize>>,
    measured: Arc<RwLock<Option<f64>>>,
    measurements: Arc<RwLock<usize>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl SpyTranscoder {
    fn with_outcome(outcome: SpyOutcome) -> Self {
        Self {
            outcome,
            failures: Arc::new(RwLock::new(VecDeque::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            probes: Arc::new(RwLock::new(0)),
            measured: Arc::new(RwLock::new(None)),
            measurements: Arc::new(RwLock::new(0)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Available, every run returns `bytes`.
    pub fn succeeding(bytes: impl Into<Bytes>) -> Self {
        Self::with_outcome(SpyOutcome::Bytes(bytes.into()))
    }

    /// Available, every run fails with `Failed` carrying the detail of `error`.
    pub fn failing(error: TranscodeError) -> Self {
        let stderr = match error {
            TranscodeError::Failed { stderr, .. } => stderr,
            other => other.to_string(),
        };
        Self::with_outcome(SpyOutcome::Error(stderr))
    }

    /// Fails the availability probe.
    pub fn unavailable() -> Self {
        Self::with_outcome(SpyOutcome::Unavailable)
    }

    /// Queue a failure for the next run.
    pub async fn push_failure(&self, error: TranscodeError) {
        self.failures.write().await.push_back(error);
    }

    /// Report this duration when asked to measure an input.
    pub async fn set_measured_duration(&self, secs: f64) {
        *self.measured.write().await = Some(secs);
    }

    pub async fn measurements(&self) -> usize {
        *self.measurements.read().await
    }

    /// Sleep this long inside every run.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn invocations(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn probe_count(&self) -> usize {
        *self.probes.read().await
    }

    pub async fn last_request(&self) -> Option<ConversionRequest> {
        self.requests.read().await.last().cloned()
    }

    /// Quality tier of every run, in order.
    pub async fn qualities(&self) -> Vec<QualityTier> {
        self.requests.read().await.iter().map(|r| r.quality).collect()
    }
}

#[async_trait]
impl LocalTranscoder for SpyTranscoder {
    fn name(&self) -> &str {
        "spy"
    }

    async fn probe_availability(&self) -> bool {
        *self.probes.write().await += 1;
        !matches!(self.outcome, SpyOutcome::Unavailable)
    }

    async fn measure_duration(&self, _input: &InputMedia, _scope: &TempScope) -> Option<f64> {
        *self.measurements.write().await += 1;
        *self.measured.read().await
    }

    async fn transcode(
        &self,
        _input: &InputMedia,
        request: &ConversionRequest,
        _scope: &TempScope,
    ) -> Result<Bytes, TranscodeError> {
        self.requests.write().await.push(request.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.write().await.pop_front() {
            return Err(error);
        }
        match &self.outcome {
            SpyOutcome::Bytes(bytes) => Ok(bytes.clone()),
            SpyOutcome::Error(stderr) => Err(TranscodeError::Failed {
                exit_code: Some(1),
                stderr: stderr.clone(),
            }),
            SpyOutcome::Unavailable => Err(TranscodeError::Unavailable {
                path: "spy".into(),
            }),
        }
    }
}

/// [`RemoteConverter`] that counts calls and hands back a fixed locator.
#[derive(Debug, Clone)]
pub struct SpyRemote {
    result: Option<Bytes>,
    converts: Arc<RwLock<usize>>,
    downloads: Arc<RwLock<usize>>,
}

impl SpyRemote {
    fn with_result(result: Option<Bytes>) -> Self {
        Self {
            result,
            converts: Arc::new(RwLock::new(0)),
            downloads: Arc::new(RwLock::new(0)),
        }
    }

    /// Conversions succeed and downloads return `bytes`.
    pub fn succeeding(bytes: impl Into<Bytes>) -> Self {
        Self::with_result(Some(bytes.into()))
    }

    /// Conversions fail because the result page has no output.
    pub fn failing() -> Self {
        Self::with_result(None)
    }

    pub async fn invocations(&self) -> usize {
        *self.converts.read().await
    }

    pub async fn downloads(&self) -> usize {
        *self.downloads.read().await
    }
}

#[async_trait]
impl RemoteConverter for SpyRemote {
    fn name(&self) -> &str {
        "spy-remote"
    }

    async fn convert(&self, _input: &InputMedia, target: RemoteTarget) -> Result<Url, RemoteError> {
        *self.converts.write().await += 1;
        if self.result.is_none() {
            return Err(RemoteError::MissingResult);
        }
        let extension = match target {
            RemoteTarget::Mp4 => "mp4",
            RemoteTarget::Png => "png",
        };
        let raw = format!("https://remote.test/tmp/result.{}", extension);
        Url::parse(&raw).map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    async fn download(&self, _locator: &Url) -> Result<Bytes, RemoteError> {
        *self.downloads.write().await += 1;
        self.result.clone().ok_or(RemoteError::EmptyDownload)
    }
}
