//! Encoder capability detection
//!
//! The host's encoder list is queried from ffmpeg once per process and cached.
//! Selection logic never talks to ffmpeg directly: it only sees a
//! [`CapabilityProbe`], which tests build from a fake query.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::error::EncodeError;

// ============================================================================
// Codecs and encoder tags
// ============================================================================

/// Target video codec for re-encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    H264,
    H265,
}

/// Encoder family, independent of codec
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EncoderTag {
    Nvenc,        // NVIDIA
    Qsv,          // Intel Quick Sync
    Vaapi,        // VA-API (Intel/AMD on Linux)
    Amf,          // AMD AMF
    #[value(name = "videotoolbox")]
    VideoToolbox, // macOS
    Software,
}

impl EncoderTag {
    /// Hardware tags in the default preference order (discrete GPUs first)
    pub const HARDWARE: [EncoderTag; 5] = [
        EncoderTag::Nvenc,
        EncoderTag::Qsv,
        EncoderTag::Vaapi,
        EncoderTag::Amf,
        EncoderTag::VideoToolbox,
    ];

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::Software)
    }

    /// Encoder family of an ffmpeg encoder name; anything unrecognised is software
    pub fn from_encoder_name(encoder: &str) -> Self {
        let name = encoder.to_ascii_lowercase();
        if name.contains("nvenc") {
            Self::Nvenc
        } else if name.ends_with("_qsv") {
            Self::Qsv
        } else if name.ends_with("_vaapi") {
            Self::Vaapi
        } else if name.ends_with("_amf") {
            Self::Amf
        } else if name.ends_with("_videotoolbox") {
            Self::VideoToolbox
        } else {
            Self::Software
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nvenc => "nvenc",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
            Self::Amf => "amf",
            Self::VideoToolbox => "videotoolbox",
            Self::Software => "software",
        }
    }
}

impl fmt::Display for EncoderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Codec {
    /// FFmpeg encoder name for this codec on the given encoder family
    pub fn encoder_name(&self, tag: EncoderTag) -> &'static str {
        match (self, tag) {
            (Self::H264, EncoderTag::Nvenc) => "h264_nvenc",
            (Self::H264, EncoderTag::Qsv) => "h264_qsv",
            (Self::H264, EncoderTag::Vaapi) => "h264_vaapi",
            (Self::H264, EncoderTag::Amf) => "h264_amf",
            (Self::H264, EncoderTag::VideoToolbox) => "h264_videotoolbox",
            (Self::H264, EncoderTag::Software) => "libx264",
            (Self::H265, EncoderTag::Nvenc) => "hevc_nvenc",
            (Self::H265, EncoderTag::Qsv) => "hevc_qsv",
            (Self::H265, EncoderTag::Vaapi) => "hevc_vaapi",
            (Self::H265, EncoderTag::Amf) => "hevc_amf",
            (Self::H265, EncoderTag::VideoToolbox) => "hevc_videotoolbox",
            (Self::H265, EncoderTag::Software) => "libx265",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::H264 => "H.264",
            Self::H265 => "H.265/HEVC",
        }
    }
}

/// Fallback VA-API render node when none can be detected
pub const DEFAULT_RENDER_DEVICE: &str = "/dev/dri/renderD128";

/// Detect available render device
/// Scans /dev/dri/renderD* and returns the first available
pub fn detect_render_device() -> Option<String> {
    detect_render_device_in(Path::new("/dev/dri"))
}

fn detect_render_device_in(dri_path: &Path) -> Option<String> {
    if !dri_path.exists() {
        return None;
    }

    // Collect all renderD* devices
    let mut devices: Vec<_> = std::fs::read_dir(dri_path)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("renderD"))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();

    // Sort to get renderD128 before renderD129, etc.
    devices.sort();

    devices.first().map(|p| p.to_string_lossy().to_string())
}

// ============================================================================
// Capability probe
// ============================================================================

/// Set of encoder names available on this host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityProbe {
    encoders: BTreeSet<String>,
}

impl CapabilityProbe {
    /// Build a probe from an explicit list of ffmpeg encoder names
    pub fn from_encoders<I, S>(encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoders: encoders.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a probe from an injected capability query
    pub fn detect_with<F>(query: F) -> Result<Self, EncodeError>
    where
        F: FnOnce() -> Result<BTreeSet<String>, EncodeError>,
    {
        Ok(Self {
            encoders: query()?,
        })
    }

    /// Whether the given encoder family is usable for this codec.
    /// Software is always available; it is the guaranteed fallback.
    pub fn supports(&self, codec: Codec, tag: EncoderTag) -> bool {
        !tag.is_hardware() || self.encoders.contains(codec.encoder_name(tag))
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    /// Hardware families usable for this codec, in canonical order
    pub fn hardware_tags(&self, codec: Codec) -> Vec<EncoderTag> {
        EncoderTag::HARDWARE
            .into_iter()
            .filter(|tag| self.supports(codec, *tag))
            .collect()
    }

    pub fn encoders(&self) -> impl Iterator<Item = &str> {
        self.encoders.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

/// Parse the table printed by `ffmpeg -encoders` into encoder names.
///
/// Rows look like ` V....D libx264   libx264 H.264 / AVC ...` and follow a
/// ` ------` separator; everything before the separator is the legend.
pub fn parse_encoders_output(output: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut in_table = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if !in_table {
            if trimmed.starts_with("---") {
                in_table = true;
            }
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        if flags.len() == 6 {
            names.insert(name.to_string());
        }
    }

    names
}

/// Query ffmpeg for its encoder list
pub fn query_ffmpeg_encoders(ffmpeg: &str) -> Result<BTreeSet<String>, EncodeError> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| EncodeError::ToolNotAvailable {
            tool: ffmpeg.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(EncodeError::ToolNotAvailable {
            tool: ffmpeg.to_string(),
            reason: format!("`-encoders` query failed with status {}", output.status),
        });
    }

    Ok(parse_encoders_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Process-wide capability cache, filled on first successful probe.
static CAPABILITY_CACHE: OnceLock<CapabilityProbe> = OnceLock::new();

/// Capability probe for this process.
///
/// The first call queries ffmpeg; every later call returns the cached probe
/// without re-querying. A failed query is not cached.
pub fn capabilities(ffmpeg: &str) -> Result<&'static CapabilityProbe, EncodeError> {
    if let Some(probe) = CAPABILITY_CACHE.get() {
        return Ok(probe);
    }

    let probe = CapabilityProbe::detect_with(|| query_ffmpeg_encoders(ffmpeg))?;
    tracing::debug!(
        encoders = probe.len(),
        "probed ffmpeg encoder capabilities"
    );
    Ok(CAPABILITY_CACHE.get_or_init(|| probe))
}
