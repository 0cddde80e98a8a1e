use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;

use super::audio::transcode_codec;
use super::error::EncodeError;
use super::hardware::Codec;
use super::request::{AudioPolicy, EncodeRequest};
use super::strategy::Attempt;

/// Where ffmpeg reads its input from
#[derive(Debug, Clone, Copy)]
pub enum InputSource<'a> {
    /// An ffconcat manifest listing every input in order
    Concat(&'a Path),
    File(&'a Path),
}

/// Quote a path for an ffconcat `file` directive
fn concat_quote(path: &Path) -> String {
    // Single quotes cannot be escaped inside quotes: close, escape, reopen
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Manifest body for the concat demuxer
pub fn concat_manifest(inputs: &[PathBuf]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for input in inputs {
        manifest.push_str("file ");
        manifest.push_str(&concat_quote(input));
        manifest.push('\n');
    }
    manifest
}

/// Write the concat manifest to a temp file.
/// The file is deleted when the returned handle drops, on every exit path.
pub fn write_concat_manifest(inputs: &[PathBuf]) -> Result<NamedTempFile, EncodeError> {
    let mut file = tempfile::Builder::new()
        .prefix("ffmerge-concat-")
        .suffix(".txt")
        .tempfile()
        .map_err(|e| EncodeError::io("Failed to create concat manifest", e))?;

    file.write_all(concat_manifest(inputs).as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| EncodeError::io("Failed to write concat manifest", e))?;

    Ok(file)
}

fn is_mp4_family(container: &str) -> bool {
    matches!(container, "mp4" | "m4v" | "mov")
}

/// Build the ffmpeg invocation for one attempt
pub fn build_ffmpeg_cmd(
    ffmpeg: &str,
    source: InputSource<'_>,
    request: &EncodeRequest,
    attempt: &Attempt,
    audio: AudioPolicy,
) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-hide_banner").arg("-nostdin");
    cmd.arg(if request.overwrite { "-y" } else { "-n" });

    // Device initialisation must precede the input
    if let Attempt::Encode(cfg) = attempt {
        cmd.args(&cfg.input_args);
    }

    match source {
        InputSource::Concat(manifest) => {
            cmd.args(["-f", "concat", "-safe", "0", "-i"]).arg(manifest);
        }
        InputSource::File(path) => {
            cmd.arg("-i").arg(path);
        }
    }

    // Progress output
    cmd.args(["-progress", "pipe:1", "-nostats"]);

    cmd.args(["-map", "0:v:0?", "-map", "0:a?"]);

    match attempt {
        Attempt::StreamCopy => {
            cmd.args(["-c:v", "copy"]);
        }
        Attempt::Encode(cfg) => {
            cmd.arg("-c:v").arg(&cfg.encoder);
            cmd.args(cfg.preset_args());
            cmd.args(cfg.quality_args());
            if !cfg.filters.is_empty() {
                cmd.arg("-vf").arg(cfg.filters.join(","));
            }
            // QuickTime players only accept HEVC tagged as hvc1
            if request.codec == Codec::H265 && is_mp4_family(&request.container) {
                cmd.args(["-tag:v", "hvc1"]);
            }
        }
    }

    match audio {
        AudioPolicy::Copy => {
            cmd.args(["-c:a", "copy"]);
        }
        AudioPolicy::Transcode => {
            cmd.arg("-c:a").arg(transcode_codec(&request.container));
            cmd.arg("-b:a")
                .arg(format!("{}k", request.audio_bitrate_kbps.max(32)));
        }
    }

    if is_mp4_family(&request.container) {
        cmd.args(["-movflags", "+faststart"]);
    }

    cmd.args(&request.extra_args);
    cmd.arg(&request.output);
    cmd
}

/// Render a command as a copy-pasteable shell line
pub fn format_cmd(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| {
            let s = arg.to_string_lossy();
            shlex::try_quote(&s)
                .map(|q| q.into_owned())
                .unwrap_or_else(|_| s.into_owned())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
