//! Two-tier execution: run a primary attempt, degrade on failure.
//!
//! Shared by the orchestrator (local then remote) and the sticker encoder
//! (rich then metadata-only). Each tier's result is counted under its label
//! in `stickerline_backend_attempts_total`.

use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

use crate::metrics::record_attempt;

/// Runs `primary`; on error hands the error to `fallback` and returns its result.
///
/// The fallback receives the primary error so it can decide whether to
/// degrade at all, and can fold its detail into its own error.
pub async fn with_fallback<T, E, P, F, Fut>(
    primary_label: &'static str,
    primary: P,
    fallback: F,
) -> Result<T, E>
where
    P: Future<Output = Result<T, E>>,
    F: FnOnce(E) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match primary.await {
        Ok(value) => {
            record_attempt(primary_label, true);
            debug!(tier = primary_label, "Primary tier succeeded");
            Ok(value)
        }
        Err(err) => {
            record_attempt(primary_label, false);
            warn!(tier = primary_label, error = %err, "Primary tier failed, degrading");
            fallback(err).await
        }
    }
}

/// Runs one tier and records its result.
pub async fn tier<T, E, Fut>(label: &'static str, attempt: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let result = attempt.await;
    record_attempt(label, result.is_ok());
    result
}
