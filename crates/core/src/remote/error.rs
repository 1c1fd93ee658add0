//! Remote fallback errors.

use thiserror::Error;

use crate::media::ConversionError;

/// Errors raised by an [`HttpTransport`](super::HttpTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Errors of the remote conversion flow.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote fallback is disabled")]
    Disabled,

    #[error("No remote route for {0}")]
    NoRoute(String),

    #[error("Transport error during {step}: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("HTTP {status} during {step}")]
    Status { step: &'static str, status: u16 },

    #[error("Upload response has no form")]
    MissingForm,

    #[error("Upload form has no result token")]
    MissingToken,

    #[error("Conversion page has no result")]
    MissingResult,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Downloaded result is empty")]
    EmptyDownload,
}

impl RemoteError {
    pub fn transport(step: &'static str, source: TransportError) -> Self {
        Self::Transport { step, source }
    }
}

impl From<RemoteError> for ConversionError {
    fn from(err: RemoteError) -> Self {
        ConversionError::remote_failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FailureReason;

    #[test]
    fn test_maps_to_remote_failed() {
        let err: ConversionError = RemoteError::Status {
            step: "upload",
            status: 503,
        }
        .into();
        assert_eq!(err.reason(), FailureReason::RemoteFailed);
        assert_eq!(err.detail(), "HTTP 503 during upload");
    }

    #[test]
    fn test_transport_detail() {
        let err = RemoteError::transport("convert", TransportError::Timeout);
        assert_eq!(err.to_string(), "Transport error during convert: Request timeout");
    }
}
