// Shared fixtures for integration tests
#![allow(dead_code)]

use ffmerge::engine::{Backend, EncodeError, RunOutput};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// What the fake tool does for one invocation
pub enum Scripted {
    Succeed,
    /// Fail after leaving a partial output file behind
    Fail { exit_code: i32, stderr: String },
    /// Fail before opening the output
    FailEarly { exit_code: i32, stderr: String },
    Cancel,
    Error(EncodeError),
}

impl Scripted {
    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Scripted::Fail {
            exit_code,
            stderr: stderr.to_string(),
        }
    }

    pub fn fail_early(exit_code: i32, stderr: &str) -> Self {
        Scripted::FailEarly {
            exit_code,
            stderr: stderr.to_string(),
        }
    }
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub args: Vec<String>,
    /// Concat manifest path and contents, read while the invocation ran
    pub manifest: Option<(PathBuf, String)>,
}

/// Backend that records invocations instead of running ffmpeg
pub struct FakeBackend {
    script: VecDeque<Scripted>,
    audio: HashMap<PathBuf, Vec<String>>,
    pub invocations: Vec<Invocation>,
    pub probed: Vec<PathBuf>,
}

impl FakeBackend {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            audio: HashMap::new(),
            invocations: Vec::new(),
            probed: Vec::new(),
        }
    }

    pub fn with_audio(mut self, input: &Path, codecs: &[&str]) -> Self {
        self.audio.insert(
            input.to_path_buf(),
            codecs.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn count(&self) -> usize {
        self.invocations.len()
    }
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

impl Backend for FakeBackend {
    fn ffmpeg(&self) -> &str {
        "ffmpeg"
    }

    fn audio_codecs(&mut self, input: &Path) -> Result<Vec<String>, EncodeError> {
        self.probed.push(input.to_path_buf());
        Ok(self
            .audio
            .get(input)
            .cloned()
            .unwrap_or_else(|| vec!["aac".to_string()]))
    }

    fn run(&mut self, cmd: Command) -> Result<RunOutput, EncodeError> {
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let manifest = if arg_after(&args, "-f") == Some("concat") {
            arg_after(&args, "-i").map(|p| {
                let path = PathBuf::from(p);
                let contents = fs::read_to_string(&path).unwrap_or_default();
                (path, contents)
            })
        } else {
            None
        };
        let output = PathBuf::from(args.last().cloned().unwrap_or_default());
        self.invocations.push(Invocation { args, manifest });

        match self.script.pop_front().unwrap_or(Scripted::Succeed) {
            Scripted::Succeed => {
                fs::write(&output, b"encoded").unwrap();
                Ok(RunOutput::succeeded())
            }
            Scripted::Fail { exit_code, stderr } => {
                fs::write(&output, b"partial").unwrap();
                Ok(RunOutput::failed(exit_code, stderr))
            }
            Scripted::FailEarly { exit_code, stderr } => Ok(RunOutput::failed(exit_code, stderr)),
            Scripted::Cancel => {
                fs::write(&output, b"partial").unwrap();
                Ok(RunOutput {
                    success: false,
                    exit_code: Some(255),
                    cancelled: true,
                    stderr: "Exiting normally, received signal 2.".to_string(),
                })
            }
            Scripted::Error(e) => Err(e),
        }
    }
}

/// Temp directory with empty video files
pub fn video_dir(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let paths = names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, b"video").unwrap();
            path.canonicalize().unwrap()
        })
        .collect();
    (dir, paths)
}
