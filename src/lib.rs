//! Merge and transcode videos with ffmpeg, choosing the best available
//! encoder from a preference list and retrying once on failure.

pub mod config;
pub mod engine;
pub mod logging;
