use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use super::error::EncodeError;

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

fn tool_version(tool: &str) -> Result<String> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", tool))?;

    if !output.status.success() {
        anyhow::bail!("{} command failed with status: {}", tool, output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Check if ffmpeg is available and return its version
pub fn ffmpeg_version(ffmpeg: &str) -> Result<String> {
    tool_version(ffmpeg)
}

/// Check if ffprobe is available and return its version
pub fn ffprobe_version(ffprobe: &str) -> Result<String> {
    tool_version(ffprobe)
}

/// Audio codec names of every audio stream in a file
pub fn probe_audio_codecs(ffprobe: &str, path: &Path) -> Result<Vec<String>, EncodeError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| EncodeError::ToolNotAvailable {
            tool: ffprobe.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(EncodeError::io(
            format!("ffprobe failed for {}", path.display()),
            std::io::Error::other(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        ));
    }

    parse_audio_codecs(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
        EncodeError::io(
            format!("Unreadable ffprobe output for {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

/// Parse audio codec names from ffprobe JSON
pub fn parse_audio_codecs(json: &str) -> Result<Vec<String>, serde_json::Error> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;
    Ok(probe
        .streams
        .into_iter()
        .filter_map(|s| s.codec_name)
        .map(|c| c.to_ascii_lowercase())
        .collect())
}
