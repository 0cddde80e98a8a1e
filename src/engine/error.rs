//! Error kinds surfaced by the encode engine and their exit-code mapping.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for invalid or missing input (and a missing toolchain).
pub const EXIT_INVALID_INPUT: i32 = 1;
/// Exit code when every planned strategy failed.
pub const EXIT_STRATEGIES_EXHAUSTED: i32 = 2;

/// One failed tool invocation, kept verbatim for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} exited with status {}", self.strategy, code)?,
            None => write!(f, "{} was terminated by a signal", self.strategy)?,
        }
        if !self.stderr.is_empty() {
            write!(f, "\n{}", self.stderr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no matching inputs")]
    NoMatchingInputs,

    #[error("output already exists: {} (pass --overwrite to replace it)", .0.display())]
    OutputExists(PathBuf),

    #[error("output {} is also one of the inputs; choose a different output path", .0.display())]
    OutputIsInput(PathBuf),

    #[error("{tool} is not available: {reason}")]
    ToolNotAvailable { tool: String, reason: String },

    #[error("strategy failed: {0}")]
    StrategyExecutionFailed(StrategyFailure),

    #[error("all strategies exhausted:\n{}", format_failures(.failures))]
    AllStrategiesExhausted { failures: Vec<StrategyFailure> },

    #[error("interrupted while running {strategy}")]
    Interrupted { strategy: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EncodeError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StrategyExecutionFailed(_)
            | Self::AllStrategiesExhausted { .. }
            | Self::Interrupted { .. } => EXIT_STRATEGIES_EXHAUSTED,
            Self::NoMatchingInputs
            | Self::OutputExists(_)
            | Self::OutputIsInput(_)
            | Self::ToolNotAvailable { .. }
            | Self::Io { .. } => EXIT_INVALID_INPUT,
        }
    }

    /// Failures recorded for each attempted strategy, oldest first.
    pub fn failures(&self) -> &[StrategyFailure] {
        match self {
            Self::StrategyExecutionFailed(failure) => std::slice::from_ref(failure),
            Self::AllStrategiesExhausted { failures } => failures,
            _ => &[],
        }
    }
}

fn format_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, f)| format!("  attempt {}: {}", i + 1, f))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep only the last `max_lines` lines of tool diagnostics (the most relevant part).
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    if lines.len() > max_lines {
        lines[lines.len() - max_lines..].join("\n")
    } else {
        lines.join("\n")
    }
}
