//! HTTP surface of the stickerline conversion pipeline.

pub mod api;
pub mod metrics;
pub mod state;
