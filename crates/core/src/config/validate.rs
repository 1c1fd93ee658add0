use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - CRF values are within x264's 0-51 range
/// - Duration cap and timeouts are positive
/// - Remote base URL is set when the fallback is enabled
/// - WebP qualities are within 0-100
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    let transcoder = &config.transcoder;
    if transcoder.crf_high > 51 || transcoder.crf_degraded > 51 {
        return invalid("transcoder.crf_high and transcoder.crf_degraded must be at most 51");
    }
    if transcoder.timeout_secs == 0 || transcoder.probe_timeout_secs == 0 {
        return invalid("transcoder timeouts must be positive");
    }
    if transcoder.frame_size == 0 {
        return invalid("transcoder.frame_size must be positive");
    }
    if transcoder.webp_quality_high > 100 || transcoder.webp_quality_degraded > 100 {
        return invalid("transcoder webp qualities must be between 0 and 100");
    }

    if config.remote.enabled && config.remote.base_url.trim().is_empty() {
        return invalid("remote.base_url cannot be empty when remote.enabled = true");
    }

    let sticker = &config.sticker;
    for quality in [sticker.quality, sticker.quality_degraded] {
        if !(0.0..=100.0).contains(&quality) {
            return invalid("sticker qualities must be between 0 and 100");
        }
    }
    if sticker.canvas_size == 0 {
        return invalid("sticker.canvas_size must be positive");
    }

    let orchestrator = &config.orchestrator;
    if !(orchestrator.max_animated_duration_secs > 0.0) {
        return invalid("orchestrator.max_animated_duration_secs must be positive");
    }
    if orchestrator.request_timeout_secs == 0 {
        return invalid("orchestrator.request_timeout_secs must be positive");
    }

    Ok(())
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}
