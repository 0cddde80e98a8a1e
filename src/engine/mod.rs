// Encode engine - independent of the CLI

pub mod audio;
pub mod error;
pub mod execute;
pub mod ffmpeg_cmd;
pub mod ffmpeg_info;
pub mod hardware;
pub mod request;
pub mod runner;
pub mod strategy;

pub use audio::{AudioSafety, resolve_audio_policy};
pub use error::{EncodeError, StrategyFailure};
pub use execute::{EncodeOutcome, Encoded, Preview, execute, execute_each, preview, preview_each};
pub use ffmpeg_info::{ffmpeg_version, ffprobe_version};
pub use hardware::{CapabilityProbe, Codec, EncoderTag, capabilities};
pub use request::{AudioPolicy, EncodeRequest, Mode, collect_inputs};
pub use runner::{Backend, FfmpegBackend, RunOutput};
pub use strategy::{Attempt, EncodeStrategy, EncoderConfig, Preferences, StrategySettings, select_strategy};
