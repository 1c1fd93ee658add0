//! Remote conversion fallback.
//!
//! Used when the local transcoder is missing or failed. The only
//! implementation emulates a browser on an ezgif-style site: upload the
//! sticker, replay the conversion form it returns, scrape the result locator.
//! There is no retry at this tier.

mod config;
mod error;
mod form_scrape;
pub mod html;
mod transport;

pub use config::RemoteConfig;
pub use error::{RemoteError, TransportError};
pub use form_scrape::{FormScrapeConverter, RemoteSession};
pub use transport::{FormField, HttpResponse, HttpTransport, ReqwestTransport};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::media::{InputMedia, SourceKind, TargetKind};

/// Conversion routes offered by the remote site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTarget {
    Mp4,
    Png,
}

impl RemoteTarget {
    /// Path segment of the route.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Mp4 => "webp-to-mp4",
            Self::Png => "webp-to-png",
        }
    }

    /// Route for a source/target pair. Only sticker sources have one.
    pub fn for_pair(source: SourceKind, target: TargetKind) -> Option<Self> {
        match (source, target) {
            (SourceKind::Sticker, TargetKind::Video) => Some(Self::Mp4),
            (SourceKind::Sticker, TargetKind::Image) => Some(Self::Png),
            _ => None,
        }
    }
}

/// A remote service that converts media and hands back a locator.
#[async_trait]
pub trait RemoteConverter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts `input` and returns the URL of the result.
    async fn convert(&self, input: &InputMedia, target: RemoteTarget) -> Result<Url, RemoteError>;

    /// Fetches a result locator.
    async fn download(&self, locator: &Url) -> Result<Bytes, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(RemoteTarget::Mp4.route(), "webp-to-mp4");
        assert_eq!(RemoteTarget::Png.route(), "webp-to-png");
    }

    #[test]
    fn test_only_stickers_have_remote_routes() {
        assert_eq!(
            RemoteTarget::for_pair(SourceKind::Sticker, TargetKind::Video),
            Some(RemoteTarget::Mp4)
        );
        assert_eq!(
            RemoteTarget::for_pair(SourceKind::Sticker, TargetKind::Image),
            Some(RemoteTarget::Png)
        );
        assert_eq!(RemoteTarget::for_pair(SourceKind::Audio, TargetKind::Video), None);
        assert_eq!(RemoteTarget::for_pair(SourceKind::Video, TargetKind::Video), None);
        assert_eq!(RemoteTarget::for_pair(SourceKind::Sticker, TargetKind::Sticker), None);
    }
}
