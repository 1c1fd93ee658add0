//! Conversion failure taxonomy exposed to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ProbeRejected,
    LocalUnavailable,
    LocalFailed,
    RemoteFailed,
    DurationExceeded,
    EmptyOutput,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProbeRejected => "probe_rejected",
            Self::LocalUnavailable => "local_unavailable",
            Self::LocalFailed => "local_failed",
            Self::RemoteFailed => "remote_failed",
            Self::DurationExceeded => "duration_exceeded",
            Self::EmptyOutput => "empty_output",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a conversion can end with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    /// Input could not be classified or the source/target pair is unsupported.
    #[error("Input rejected: {detail}")]
    ProbeRejected { detail: String },

    /// Local transcoder is not installed or cannot start.
    #[error("Local transcoder unavailable: {detail}")]
    LocalUnavailable { detail: String },

    /// Local transcoder ran and failed.
    #[error("Local conversion failed: {detail}")]
    LocalFailed { detail: String },

    /// Remote fallback failed.
    #[error("Remote conversion failed: {detail}")]
    RemoteFailed { detail: String },

    /// Animated source is longer than the configured cap.
    #[error("Animation too long: {duration_secs:.1}s (max {max_secs}s)")]
    DurationExceeded { duration_secs: f64, max_secs: f64 },

    /// A stage produced zero bytes.
    #[error("Empty output: {detail}")]
    EmptyOutput { detail: String },
}

impl ConversionError {
    pub fn probe_rejected(detail: impl Into<String>) -> Self {
        Self::ProbeRejected {
            detail: detail.into(),
        }
    }

    pub fn local_unavailable(detail: impl Into<String>) -> Self {
        Self::LocalUnavailable {
            detail: detail.into(),
        }
    }

    pub fn local_failed(detail: impl Into<String>) -> Self {
        Self::LocalFailed {
            detail: detail.into(),
        }
    }

    pub fn remote_failed(detail: impl Into<String>) -> Self {
        Self::RemoteFailed {
            detail: detail.into(),
        }
    }

    pub fn empty_output(detail: impl Into<String>) -> Self {
        Self::EmptyOutput {
            detail: detail.into(),
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            Self::ProbeRejected { .. } => FailureReason::ProbeRejected,
            Self::LocalUnavailable { .. } => FailureReason::LocalUnavailable,
            Self::LocalFailed { .. } => FailureReason::LocalFailed,
            Self::RemoteFailed { .. } => FailureReason::RemoteFailed,
            Self::DurationExceeded { .. } => FailureReason::DurationExceeded,
            Self::EmptyOutput { .. } => FailureReason::EmptyOutput,
        }
    }

    /// Human-readable detail string.
    pub fn detail(&self) -> String {
        match self {
            Self::ProbeRejected { detail }
            | Self::LocalUnavailable { detail }
            | Self::LocalFailed { detail }
            | Self::RemoteFailed { detail }
            | Self::EmptyOutput { detail } => detail.clone(),
            Self::DurationExceeded {
                duration_secs,
                max_secs,
            } => format!("{:.1}s exceeds {}s", duration_secs, max_secs),
        }
    }

    /// Whether the request itself was invalid, so no fallback applies.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ProbeRejected { .. } | Self::DurationExceeded { .. }
        )
    }
}
