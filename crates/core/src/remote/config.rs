//! Remote fallback configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the web-form conversion fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Whether the fallback may be used at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base URL of the conversion site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-HTTP-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Download the converted file instead of returning its URL.
    #[serde(default = "default_download_results")]
    pub download_results: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    "https://ezgif.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("stickerline/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_download_results() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            download_results: default_download_results(),
        }
    }
}
