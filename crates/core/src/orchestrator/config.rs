//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Policy knobs for the conversion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Animated sources longer than this are rejected before any work.
    #[serde(default = "default_max_duration")]
    pub max_animated_duration_secs: f64,

    /// Deadline for a whole request, all tiers included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum conversions in flight (0 = unlimited).
    /// Further requests wait for a slot.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Retry a failed local run once at degraded quality before going remote.
    #[serde(default = "default_degraded_retry")]
    pub degraded_retry: bool,
}

fn default_max_duration() -> f64 {
    7.0
}

fn default_request_timeout() -> u64 {
    180
}

fn default_max_concurrent() -> usize {
    4
}

fn default_degraded_retry() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_animated_duration_secs: default_max_duration(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            degraded_retry: default_degraded_retry(),
        }
    }
}
