use clap::{ArgAction, Args, Parser, Subcommand};
use ffmerge::engine::{AudioPolicy, Codec, EncoderTag};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffmerge")]
#[command(version, about = "Merge and transcode videos with the best available encoder", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by merge and transcode
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Input files or directories (defaults to current directory)
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Extensions picked up from directories, comma-separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    pub ext: Vec<String>,

    /// Scan directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Video codec for re-encodes
    #[arg(long, value_enum)]
    pub codec: Option<Codec>,

    /// Use this ffmpeg encoder instead of probing (e.g. h264_nvenc)
    #[arg(long, value_name = "NAME")]
    pub encoder: Option<String>,

    /// Hardware encoder preference, highest first (overrides config)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub prefer: Vec<EncoderTag>,

    /// Audio handling (copy is upgraded to transcode when the container needs it)
    #[arg(long, value_enum)]
    pub audio: Option<AudioPolicy>,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Fail on the first error instead of retrying once
    #[arg(long)]
    pub no_retry: bool,

    /// Show ffmpeg commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Concatenate inputs, in sorted order, into one file
    Merge {
        #[command(flatten)]
        args: EncodeArgs,

        /// Output file; its extension picks the container
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Re-encode instead of stream-copying (overrides config)
        #[arg(long, conflicts_with = "copy")]
        reencode: bool,

        /// Stream-copy, re-encoding only if the copy fails (overrides config)
        #[arg(long, conflicts_with = "reencode")]
        copy: bool,
    },

    /// Re-encode each input to its own file
    Transcode {
        #[command(flatten)]
        args: EncodeArgs,

        /// Directory for outputs (defaults to each input's directory)
        #[arg(short = 'd', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Output container extension (overrides config)
        #[arg(long)]
        container: Option<String>,
    },

    /// Show detected encoders and which one would be selected
    Encoders {
        #[arg(long, value_enum)]
        codec: Option<Codec>,

        /// Hardware encoder preference, highest first (overrides config)
        #[arg(long, value_enum, value_delimiter = ',')]
        prefer: Vec<EncoderTag>,
    },

    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
