// src/exec/record.rs

//! Launch descriptions and per-attempt results.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::Step;

/// Where a step's stdout/stderr go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect both streams in memory.
    Capture,
    /// Redirect to persistent per-step log files (truncated per attempt).
    LogFiles { stdout: PathBuf, stderr: PathBuf },
}

/// Everything needed to launch one attempt of a step.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub step: Step,
    /// 1-based attempt number (1 = first launch, 2 = first retry, ...).
    pub attempt: u32,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub output: OutputMode,
}

impl LaunchSpec {
    /// Human-readable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured contents of one output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedStream {
    Buffer(String),
    /// Stream was redirected to this file.
    File(PathBuf),
}

impl CapturedStream {
    /// Text of the stream, reading the log file back if needed.
    pub fn read(&self) -> std::io::Result<String> {
        match self {
            CapturedStream::Buffer(text) => Ok(text.clone()),
            CapturedStream::File(path) => fs::read_to_string(path),
        }
    }

    pub fn as_buffer(&self) -> Option<&str> {
        match self {
            CapturedStream::Buffer(text) => Some(text),
            CapturedStream::File(_) => None,
        }
    }
}

/// Result of one finished attempt of a step.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub step: Step,
    pub attempt: u32,
    /// Process exit code; `-1` when killed by a signal or never launched.
    pub exit_code: i32,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub duration: Duration,
}

impl RunRecord {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Record for an attempt whose process could not be started.
    pub fn launch_failure(spec: &LaunchSpec, message: impl Into<String>) -> Self {
        Self {
            step: spec.step,
            attempt: spec.attempt,
            exit_code: -1,
            stdout: CapturedStream::Buffer(String::new()),
            stderr: CapturedStream::Buffer(message.into()),
            duration: Duration::ZERO,
        }
    }
}
