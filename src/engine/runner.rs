//! Tool invocation seam
//!
//! The engine only sees [`Backend`]. [`FfmpegBackend`] spawns the real tools;
//! tests substitute a fake that records invocations.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::EncodeError;
use super::ffmpeg_cmd::format_cmd;
use super::ffmpeg_info::probe_audio_codecs;

/// Result of one finished tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// The user interrupted the run; partial output is kept and nothing is retried
    pub cancelled: bool,
    pub stderr: String,
}

impl RunOutput {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            cancelled: false,
            stderr: stderr.into(),
        }
    }
}

/// External tools the engine drives
pub trait Backend {
    /// Program name/path used for transcodes
    fn ffmpeg(&self) -> &str;

    /// Audio codec of every audio stream in `input`
    fn audio_codecs(&mut self, input: &Path) -> Result<Vec<String>, EncodeError>;

    /// Run one invocation to completion
    fn run(&mut self, cmd: Command) -> Result<RunOutput, EncodeError>;
}

// ============================================================================
// Interrupt handling
// ============================================================================

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Route Ctrl-C to a flag instead of killing this process.
///
/// The child ffmpeg shares the terminal's process group, receives the same
/// SIGINT and exits; we then unwind normally so temp files are dropped.
pub fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
    })
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Check if FFmpeg was cancelled by user signal (SIGTERM, SIGINT, SIGQUIT)
///
/// FFmpeg catches signals and exits gracefully, printing "Exiting normally, received signal X"
/// So we check both the process signal status AND the stderr for this message.
#[cfg(unix)]
fn was_user_cancelled(status: &ExitStatus, stderr: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if matches!(signal, 2 | 3 | 15) {
            return true;
        }
    }

    stderr.contains("received signal 2")
        || stderr.contains("received signal 3")
        || stderr.contains("received signal 15")
}

#[cfg(not(unix))]
fn was_user_cancelled(_status: &ExitStatus, stderr: &str) -> bool {
    stderr.contains("received signal")
}

// ============================================================================
// Progress parsing
// ============================================================================

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub total_size: Option<u64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output.
    /// Returns true when the line closes a progress block.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        let value = value.trim();

        match key.trim() {
            "out_time_us" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.out_time_us = us;
                }
            }
            "fps" => {
                if let Ok(f) = value.parse::<f64>() {
                    self.fps = Some(f);
                }
            }
            "speed" => {
                // Speed is in format "1.23x", strip the 'x'
                if let Ok(s) = value.trim_end_matches('x').parse::<f64>() {
                    self.speed = Some(s);
                }
            }
            "total_size" => {
                if let Ok(size) = value.parse::<u64>() {
                    self.total_size = Some(size);
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return true;
            }
            _ => {}
        }
        false
    }

    /// Get output time in seconds
    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Bytes muxed, once ffmpeg has reported its final progress block
    pub fn final_size(&self) -> Option<u64> {
        if self.is_complete {
            self.total_size
        } else {
            None
        }
    }
}

// ============================================================================
// Real backend
// ============================================================================

/// Spawns ffmpeg/ffprobe from the configured paths
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegBackend {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl Backend for FfmpegBackend {
    fn ffmpeg(&self) -> &str {
        &self.ffmpeg
    }

    fn audio_codecs(&mut self, input: &Path) -> Result<Vec<String>, EncodeError> {
        probe_audio_codecs(&self.ffprobe, input)
    }

    fn run(&mut self, mut cmd: Command) -> Result<RunOutput, EncodeError> {
        tracing::debug!(command = %format_cmd(&cmd), "spawning");

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let program = cmd.get_program().to_string_lossy().to_string();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncodeError::ToolNotAvailable {
                    tool: program.clone(),
                    reason: e.to_string(),
                }
            } else {
                EncodeError::io(format!("Failed to spawn {}", program), e)
            }
        })?;

        let stderr = child.stderr.take();
        let stderr_thread = std::thread::spawn(move || {
            let mut stderr_output = String::new();
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    stderr_output.push_str(&line);
                    stderr_output.push('\n');
                }
            }
            stderr_output
        });

        let mut parser = ProgressParser::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if parser.parse_line(&line) {
                    if let Some(bytes) = parser.final_size() {
                        tracing::debug!(
                            bytes,
                            out_time_s = parser.out_time_s(),
                            "ffmpeg finished writing"
                        );
                        continue;
                    }
                    tracing::debug!(
                        out_time_s = parser.out_time_s(),
                        fps = parser.fps.unwrap_or_default(),
                        speed = parser.speed.unwrap_or_default(),
                        "progress"
                    );
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| EncodeError::io(format!("Failed to wait for {}", program), e))?;

        let stderr_output = stderr_thread
            .join()
            .unwrap_or_else(|_| "Failed to capture stderr".to_string());

        Ok(RunOutput {
            success: status.success(),
            exit_code: status.code(),
            cancelled: interrupted() || was_user_cancelled(&status, &stderr_output),
            stderr: stderr_output,
        })
    }
}
