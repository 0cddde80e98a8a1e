//! Running a planned strategy with the bounded single-retry policy.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::audio::{AudioSafety, resolve_audio_policy};
use super::error::{EncodeError, StrategyFailure, stderr_tail};
use super::ffmpeg_cmd::{InputSource, build_ffmpeg_cmd, concat_manifest, format_cmd, write_concat_manifest};
use super::request::{AudioPolicy, EncodeRequest, derive_output_path};
use super::runner::{Backend, interrupted};
use super::strategy::EncodeStrategy;

/// Lines of tool diagnostics kept per failed attempt
const STDERR_TAIL_LINES: usize = 10;

/// A finished output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub output: PathBuf,
    pub bytes_written: u64,
    /// Label of the strategy that produced the output
    pub strategy: String,
    /// Tool invocations used, retry included
    pub invocations: usize,
    pub audio: AudioPolicy,
}

pub type EncodeOutcome = Result<Encoded, EncodeError>;

/// What a run would do, without invoking the transcoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub manifest: Option<String>,
    pub audio: AudioPolicy,
    pub commands: Vec<String>,
}

/// The output as the filesystem sees it: the file itself when it exists,
/// otherwise its resolved directory joined with the file name
fn resolve_output(output: &Path) -> PathBuf {
    if let Ok(resolved) = output.canonicalize() {
        return resolved;
    }

    let absolute = || std::path::absolute(output).unwrap_or_else(|_| output.to_path_buf());
    match (output.parent(), output.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| absolute())
        }
        _ => absolute(),
    }
}

fn check_output(request: &EncodeRequest) -> Result<(), EncodeError> {
    // Inputs are canonical; `..` and symlinked spellings must not slip through.
    // Even with overwrite, ffmpeg would truncate an input while reading it.
    let output = resolve_output(&request.output);
    if request.inputs().iter().any(|input| *input == output) {
        return Err(EncodeError::OutputIsInput(request.output.clone()));
    }
    if request.output.exists() && !request.overwrite {
        return Err(EncodeError::OutputExists(request.output.clone()));
    }

    if let Some(parent) = request.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                EncodeError::io(
                    format!("Failed to create output directory {}", parent.display()),
                    e,
                )
            })?;
        }
    }

    Ok(())
}

/// Decide audio handling before the first invocation
fn resolve_request_audio<B: Backend>(
    request: &EncodeRequest,
    backend: &mut B,
    safety: &AudioSafety,
) -> Result<AudioPolicy, EncodeError> {
    if request.audio_policy == AudioPolicy::Transcode {
        return Ok(AudioPolicy::Transcode);
    }

    let mut codecs = Vec::new();
    for input in request.inputs() {
        codecs.extend(backend.audio_codecs(input)?);
    }

    Ok(resolve_audio_policy(
        request.audio_policy,
        &request.container,
        &codecs,
        safety,
    ))
}

/// Private directory next to the output. ffmpeg writes into it and the file
/// is moved over the output only when an attempt succeeds, so a failed run
/// never touches an existing output.
fn staging_dir(output: &Path) -> Result<TempDir, EncodeError> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".ffmerge-")
        .tempdir_in(parent)
        .map_err(|e| {
            EncodeError::io(
                format!("Failed to create staging directory in {}", parent.display()),
                e,
            )
        })
}

/// Run each planned attempt in order until one succeeds.
/// A failure is retried with the next attempt only; there is never a third.
fn run_attempts<B: Backend>(
    request: &EncodeRequest,
    source: InputSource<'_>,
    strategy: &EncodeStrategy,
    backend: &mut B,
    audio: AudioPolicy,
) -> EncodeOutcome {
    let mut failures: Vec<StrategyFailure> = Vec::new();
    let file_name = request
        .output
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("output.{}", request.container)));

    for (idx, attempt) in strategy.attempts().iter().enumerate() {
        let label = attempt.label();
        if let Some(previous) = failures.last() {
            tracing::warn!(
                failed = %previous.strategy,
                "attempt failed; retrying once with {}",
                label
            );
        }

        let staging = staging_dir(&request.output)?;
        let staged_path = staging.path().join(&file_name);
        let mut staged = request.clone();
        staged.output = staged_path.clone();

        let cmd = build_ffmpeg_cmd(backend.ffmpeg(), source, &staged, attempt, audio);
        tracing::info!(strategy = %label, output = %request.output.display(), "running ffmpeg");
        let output = backend.run(cmd)?;

        if output.success {
            if !staged_path.is_file() {
                failures.push(StrategyFailure {
                    strategy: label,
                    exit_code: output.exit_code,
                    stderr: "Output file not created".to_string(),
                });
                continue;
            }

            fs::rename(&staged_path, &request.output).map_err(|e| {
                EncodeError::io(
                    format!("Failed to move output into place at {}", request.output.display()),
                    e,
                )
            })?;
            let bytes_written = fs::metadata(&request.output)
                .map(|meta| meta.len())
                .map_err(|e| {
                    EncodeError::io(format!("Failed to read {}", request.output.display()), e)
                })?;

            tracing::info!(
                strategy = %label,
                bytes = bytes_written,
                "completed {}",
                request.output.display()
            );
            return Ok(Encoded {
                output: request.output.clone(),
                bytes_written,
                strategy: label,
                invocations: idx + 1,
                audio,
            });
        }

        // Dropping the staging directory discards the partial file
        if output.cancelled || interrupted() {
            return Err(EncodeError::Interrupted { strategy: label });
        }

        tracing::debug!(strategy = %label, "ffmpeg stderr:\n{}", output.stderr);
        failures.push(StrategyFailure {
            strategy: label,
            exit_code: output.exit_code,
            stderr: stderr_tail(&output.stderr, STDERR_TAIL_LINES),
        });
    }

    if failures.len() == 1 {
        Err(EncodeError::StrategyExecutionFailed(failures.remove(0)))
    } else {
        Err(EncodeError::AllStrategiesExhausted { failures })
    }
}

/// Merge every input, in order, into `request.output`.
///
/// The concat manifest lives in a temp file for the duration of the call and
/// is removed on every exit path.
pub fn execute<B: Backend>(
    request: &EncodeRequest,
    strategy: &EncodeStrategy,
    backend: &mut B,
    safety: &AudioSafety,
) -> EncodeOutcome {
    if request.inputs().is_empty() {
        return Err(EncodeError::NoMatchingInputs);
    }
    check_output(request)?;

    let audio = resolve_request_audio(request, backend, safety)?;
    let manifest = write_concat_manifest(request.inputs())?;
    tracing::debug!(
        manifest = %manifest.path().display(),
        inputs = request.inputs().len(),
        "wrote concat manifest"
    );

    run_attempts(
        request,
        InputSource::Concat(manifest.path()),
        strategy,
        backend,
        audio,
    )
}

fn execute_single<B: Backend>(
    request: &EncodeRequest,
    input: &Path,
    strategy: &EncodeStrategy,
    backend: &mut B,
    safety: &AudioSafety,
) -> EncodeOutcome {
    check_output(request)?;
    let audio = resolve_request_audio(request, backend, safety)?;
    run_attempts(request, InputSource::File(input), strategy, backend, audio)
}

/// Transcode each input on its own into `output_dir` (or next to the input).
///
/// Each file gets its own bounded retry. Processing stops early on an
/// interrupt or a missing tool; other failures move on to the next file.
pub fn execute_each<B: Backend>(
    request: &EncodeRequest,
    strategy: &EncodeStrategy,
    backend: &mut B,
    safety: &AudioSafety,
    output_dir: Option<&Path>,
) -> Result<Vec<EncodeOutcome>, EncodeError> {
    if request.inputs().is_empty() {
        return Err(EncodeError::NoMatchingInputs);
    }

    let mut outcomes = Vec::with_capacity(request.inputs().len());
    for input in request.inputs() {
        let output = derive_output_path(input, output_dir, &request.container);
        let single = request.for_single(input, output);
        let outcome = execute_single(&single, input, strategy, backend, safety);

        let fatal = matches!(
            outcome,
            Err(EncodeError::Interrupted { .. }) | Err(EncodeError::ToolNotAvailable { .. })
        );
        if let Err(e) = &outcome {
            tracing::error!(input = %input.display(), "{}", e);
        }
        outcomes.push(outcome);
        if fatal {
            break;
        }
    }

    Ok(outcomes)
}

/// Commands a merge would run, primary first
pub fn preview<B: Backend>(
    request: &EncodeRequest,
    strategy: &EncodeStrategy,
    backend: &mut B,
    safety: &AudioSafety,
) -> Result<Preview, EncodeError> {
    if request.inputs().is_empty() {
        return Err(EncodeError::NoMatchingInputs);
    }

    let audio = resolve_request_audio(request, backend, safety)?;
    let manifest_path = Path::new("concat.txt");
    let commands = strategy
        .attempts()
        .iter()
        .map(|attempt| {
            format_cmd(&build_ffmpeg_cmd(
                backend.ffmpeg(),
                InputSource::Concat(manifest_path),
                request,
                attempt,
                audio,
            ))
        })
        .collect();

    Ok(Preview {
        manifest: Some(concat_manifest(request.inputs())),
        audio,
        commands,
    })
}

/// Commands a per-file transcode would run, per input
pub fn preview_each<B: Backend>(
    request: &EncodeRequest,
    strategy: &EncodeStrategy,
    backend: &mut B,
    safety: &AudioSafety,
    output_dir: Option<&Path>,
) -> Result<Vec<Preview>, EncodeError> {
    if request.inputs().is_empty() {
        return Err(EncodeError::NoMatchingInputs);
    }

    let mut previews = Vec::new();
    for input in request.inputs() {
        let single = request.for_single(input, derive_output_path(input, output_dir, &request.container));
        let audio = resolve_request_audio(&single, backend, safety)?;
        let commands = strategy
            .attempts()
            .iter()
            .map(|attempt| {
                format_cmd(&build_ffmpeg_cmd(
                    backend.ffmpeg(),
                    InputSource::File(input),
                    &single,
                    attempt,
                    audio,
                ))
            })
            .collect();
        previews.push(Preview {
            manifest: None,
            audio,
            commands,
        });
    }
    Ok(previews)
}
