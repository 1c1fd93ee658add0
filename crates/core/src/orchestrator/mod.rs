//! Conversion orchestrator.
//!
//! Drives each request through the state machine:
//! - **Received**: duration cap, before any I/O
//! - **Probed**: classification decides the branch
//! - **LocalAttempt / RemoteAttempt**: ffmpeg first, web-form fallback second
//! - **Encoding**: sticker targets go to the container encoder

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::ConversionOrchestrator;
pub use types::{Capabilities, RequestStage, StageCell};
