//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

use crate::media::{ConversionError, SourceKind, TargetKind};
use crate::process::ProcessError;

/// Errors that can occur during local transcoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found or not startable.
    #[error("FFmpeg unavailable at path: {path}")]
    Unavailable { path: PathBuf },

    /// Input kind was neither set on the request nor recognizable.
    #[error("Unrecognized input media: {mime}")]
    UnknownSource { mime: String },

    /// No ffmpeg route for this source/target pair.
    #[error("No local route from {from} to {target}")]
    Unsupported {
        from: SourceKind,
        target: TargetKind,
    },

    /// FFmpeg ran and exited with a failure status.
    #[error("FFmpeg exited with code {exit_code:?}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// FFmpeg did not finish in time.
    #[error("Transcoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// FFmpeg succeeded but wrote nothing.
    #[error("FFmpeg produced an empty output file")]
    EmptyOutput,

    /// Output does not carry the expected container signature.
    #[error("Invalid output: {reason}")]
    InvalidOutput { reason: String },

    /// I/O error on working files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Whether ffmpeg actually ran, so a retry with other settings may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::Timeout { .. } | Self::EmptyOutput | Self::InvalidOutput { .. }
        )
    }

    /// Diagnostic text for failure details.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Failed { exit_code, stderr } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    format!("ffmpeg exited with code {:?}", exit_code)
                } else {
                    format!("ffmpeg exited with code {:?}: {}", exit_code, stderr)
                }
            }
            other => other.to_string(),
        }
    }
}

impl From<ProcessError> for TranscodeError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { program } => Self::Unavailable { path: program },
            ProcessError::Spawn { program, .. } => Self::Unavailable { path: program },
            ProcessError::Timeout { timeout_secs, .. } => Self::Timeout { timeout_secs },
        }
    }
}

impl From<TranscodeError> for ConversionError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::Unavailable { .. } => ConversionError::local_unavailable(err.to_string()),
            TranscodeError::UnknownSource { .. } | TranscodeError::Unsupported { .. } => {
                ConversionError::probe_rejected(err.to_string())
            }
            TranscodeError::EmptyOutput => ConversionError::empty_output(err.to_string()),
            other => ConversionError::local_failed(other.diagnostic()),
        }
    }
}
