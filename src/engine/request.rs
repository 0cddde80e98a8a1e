//! Input discovery and the immutable encode request.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::error::EncodeError;
use super::hardware::Codec;

/// Default video file extensions to scan for
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv", "mts", "ts",
];

/// Video handling for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Repackage streams without re-encoding
    #[default]
    Copy,
    /// Re-encode video with the selected encoder
    Reencode,
}

/// Audio handling for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioPolicy {
    #[default]
    Copy,
    Transcode,
}

impl fmt::Display for AudioPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioPolicy::Copy => write!(f, "copy"),
            AudioPolicy::Transcode => write!(f, "transcode"),
        }
    }
}

/// Check if a path has one of the given extensions (case-insensitive)
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Expand CLI sources into candidate input files.
///
/// Explicit files are taken as given. Directories are scanned for files with a
/// matching extension, one level deep unless `recursive` is set.
pub fn collect_inputs(
    sources: &[PathBuf],
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>, EncodeError> {
    let mut candidates = Vec::new();

    for source in sources {
        if source.is_dir() {
            let max_depth = if recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(source)
                .follow_links(false)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && has_extension(path, extensions) {
                    candidates.push(path.to_path_buf());
                }
            }
        } else if source.is_file() {
            candidates.push(source.clone());
        } else {
            return Err(EncodeError::io(
                format!("Input not found: {}", source.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
    }

    resolve_inputs(candidates)
}

/// Resolve paths to canonical absolute form, drop duplicates and sort.
///
/// Sorting compares path components byte-wise, so the order does not depend
/// on the user's locale and repeated runs concatenate in the same order.
pub fn resolve_inputs<I>(paths: I) -> Result<Vec<PathBuf>, EncodeError>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut resolved = BTreeSet::new();
    for path in paths {
        let canonical = path.canonicalize().map_err(|e| {
            EncodeError::io(format!("Failed to resolve {}", path.display()), e)
        })?;
        resolved.insert(canonical);
    }
    Ok(resolved.into_iter().collect())
}

fn container_from_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// Everything needed to produce one output file.
///
/// The input list is fixed at construction: absolute, deduplicated and sorted.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub container: String,
    pub mode: Mode,
    pub audio_policy: AudioPolicy,
    pub codec: Codec,
    pub encoder_override: Option<String>,
    pub overwrite: bool,
    pub audio_bitrate_kbps: u32,
    pub extra_args: Vec<String>,
}

impl EncodeRequest {
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        let inputs: BTreeSet<PathBuf> = inputs
            .into_iter()
            .map(|p| std::path::absolute(&p).unwrap_or(p))
            .collect();
        let container = container_from_path(&output).unwrap_or_else(|| "mp4".to_string());

        Self {
            inputs: inputs.into_iter().collect(),
            output,
            container,
            mode: Mode::default(),
            audio_policy: AudioPolicy::default(),
            codec: Codec::default(),
            encoder_override: None,
            overwrite: false,
            audio_bitrate_kbps: 192,
            extra_args: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_audio_policy(mut self, policy: AudioPolicy) -> Self {
        self.audio_policy = policy;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_encoder_override(mut self, encoder: Option<String>) -> Self {
        self.encoder_override = encoder.filter(|e| !e.is_empty());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_container(mut self, container: &str) -> Self {
        self.container = container.trim_start_matches('.').to_ascii_lowercase();
        self
    }

    pub fn with_audio_bitrate(mut self, kbps: u32) -> Self {
        self.audio_bitrate_kbps = kbps;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Same settings, one input, its own output (per-file operations)
    pub(crate) fn for_single(&self, input: &Path, output: PathBuf) -> Self {
        Self {
            inputs: vec![input.to_path_buf()],
            output,
            ..self.clone()
        }
    }
}

/// Output path for a per-file operation: `<dir>/<stem>.<container>`.
/// Without an output directory the input's own directory is used; a name that
/// would collide with the input itself gets an `.encoded` suffix.
pub fn derive_output_path(input: &Path, output_dir: Option<&Path>, container: &str) -> PathBuf {
    let dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.parent().unwrap_or_else(|| Path::new(".")).to_path_buf());
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let candidate = dir.join(format!("{}.{}", stem, container));
    if candidate == input {
        dir.join(format!("{}.encoded.{}", stem, container))
    } else {
        candidate
    }
}
