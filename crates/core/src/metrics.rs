//! Prometheus metrics for the conversion pipeline.
//!
//! This module provides metrics for:
//! - Conversions (outcome per target, duration)
//! - Backend attempts (local ffmpeg, remote fallback, sticker encoder)
//! - Working file cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Conversions
// =============================================================================

/// Conversions total by target and outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stickerline_conversions_total", "Total conversion requests"),
        &["target", "outcome"], // outcome: "success" or a failure reason code
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stickerline_conversion_duration_seconds",
            "End-to-end duration of a conversion request",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["target"],
    )
    .unwrap()
});

// =============================================================================
// Backends
// =============================================================================

/// Backend attempts by backend and result.
pub static BACKEND_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stickerline_backend_attempts_total",
            "Attempts per conversion backend",
        ),
        &["backend", "result"], // backend: "local", "local_degraded", "remote", "encoder_rich", "encoder_degraded"
    )
    .unwrap()
});

// =============================================================================
// Working files
// =============================================================================

/// Temp files that could not be removed.
pub static TEMP_CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "stickerline_temp_cleanup_failures_total",
        "Working files that could not be removed at scope end",
    )
    .unwrap()
});

// =============================================================================
// Helpers
// =============================================================================

/// Records one backend attempt.
pub fn record_attempt(backend: &str, success: bool) {
    BACKEND_ATTEMPTS
        .with_label_values(&[backend, if success { "success" } else { "failure" }])
        .inc();
}

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(BACKEND_ATTEMPTS.clone()),
        Box::new(TEMP_CLEANUP_FAILURES.clone()),
    ]
}
