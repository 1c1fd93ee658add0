//! Types for the conversion orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::media::ConversionError;
use crate::transcoder::EncoderCapabilities;

/// Where a request currently is in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Received,
    Probed,
    LocalAttempt,
    RemoteAttempt,
    Encoding,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Probed => "probed",
            Self::LocalAttempt => "local_attempt",
            Self::RemoteAttempt => "remote_attempt",
            Self::Encoding => "encoding",
        }
    }

    /// Failure reported when the request deadline expires in this stage.
    pub fn deadline_error(&self, timeout_secs: u64) -> ConversionError {
        let detail = format!(
            "request deadline of {}s exceeded during {}",
            timeout_secs,
            self.as_str()
        );
        match self {
            Self::RemoteAttempt => ConversionError::remote_failed(detail),
            _ => ConversionError::local_failed(detail),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Probed,
            2 => Self::LocalAttempt,
            3 => Self::RemoteAttempt,
            4 => Self::Encoding,
            _ => Self::Received,
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage marker readable after the request future was dropped.
#[derive(Debug, Default)]
pub struct StageCell(AtomicU8);

impl StageCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, stage: RequestStage) {
        self.0.store(stage as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> RequestStage {
        RequestStage::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// What the orchestrator can currently do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub local_transcoder: bool,
    pub remote_fallback: bool,
    /// Only known when the local transcoder is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoders: Option<EncoderCapabilities>,
}
