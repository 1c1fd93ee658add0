//! Local transcoding through ffmpeg.
//!
//! Each source/target pair maps to one [`TranscodeRoute`]; the ffmpeg adapter
//! builds the argument list for it, runs the binary through the
//! [`ProcessRunner`](crate::process::ProcessRunner) port and validates the
//! container signature of what it wrote.

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;

pub use capabilities::EncoderCapabilities;
pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::{input_extension, parse_ffprobe_duration, FfmpegTranscoder};
pub use traits::{LocalTranscoder, TranscodeRoute};
