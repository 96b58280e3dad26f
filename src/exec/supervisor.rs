// src/exec/supervisor.rs

//! `tokio::process`-backed [`ProcessHandle`].

use std::fs::File;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::errors::{Result, RrmflowError};
use crate::exec::backend::{ProcessHandle, ProcessPoll};
use crate::exec::record::{CapturedStream, LaunchSpec, OutputMode, RunRecord};
use crate::types::Step;

/// One output stream of a child process.
///
/// Piped streams are drained by a background tokio task (so the child never
/// blocks on a full pipe) which hands the full buffer back over a oneshot
/// channel once it reaches EOF.
#[derive(Debug)]
enum StreamDrain {
    Pending(oneshot::Receiver<String>),
    Done(CapturedStream),
}

impl StreamDrain {
    fn spawn<R>(reader: Option<R>, step: Step, stream: &'static str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let Some(mut reader) = reader else {
            return StreamDrain::Done(CapturedStream::Buffer(String::new()));
        };

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = reader.read_to_end(&mut buf).await {
                warn!(step = %step, stream, error = %e, "error reading process output");
            }
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        StreamDrain::Pending(rx)
    }

    /// Returns `true` once the stream is complete.
    fn ready(&mut self) -> bool {
        if let StreamDrain::Pending(rx) = self {
            match rx.try_recv() {
                Ok(text) => *self = StreamDrain::Done(CapturedStream::Buffer(text)),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Closed) => {
                    *self = StreamDrain::Done(CapturedStream::Buffer(String::new()))
                }
            }
        }
        true
    }

    fn take(&mut self) -> CapturedStream {
        match std::mem::replace(self, StreamDrain::Done(CapturedStream::Buffer(String::new()))) {
            StreamDrain::Done(stream) => stream,
            StreamDrain::Pending(_) => CapturedStream::Buffer(String::new()),
        }
    }
}

/// A running step process.
///
/// The child is killed if this handle is dropped before it exits.
#[derive(Debug)]
pub struct TokioProcess {
    step: Step,
    attempt: u32,
    child: Child,
    exit_code: Option<i32>,
    stdout: StreamDrain,
    stderr: StreamDrain,
    started: Instant,
}

impl TokioProcess {
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let launch_error = |message: String| RrmflowError::ProcessLaunch {
            step: spec.step,
            message,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match &spec.output {
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::LogFiles { stdout, stderr } => {
                let out = File::create(stdout)
                    .map_err(|e| launch_error(format!("creating {}: {e}", stdout.display())))?;
                let err = File::create(stderr)
                    .map_err(|e| launch_error(format!("creating {}: {e}", stderr.display())))?;
                cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| launch_error(format!("spawning `{}`: {e}", spec.command_line())))?;

        info!(
            step = %spec.step,
            attempt = spec.attempt,
            pid = child.id(),
            cmd = %spec.command_line(),
            cwd = %spec.cwd.display(),
            "started step process"
        );

        let (stdout, stderr) = match &spec.output {
            OutputMode::Capture => (
                StreamDrain::spawn(child.stdout.take(), spec.step, "stdout"),
                StreamDrain::spawn(child.stderr.take(), spec.step, "stderr"),
            ),
            OutputMode::LogFiles { stdout, stderr } => (
                StreamDrain::Done(CapturedStream::File(stdout.clone())),
                StreamDrain::Done(CapturedStream::File(stderr.clone())),
            ),
        };

        Ok(Self {
            step: spec.step,
            attempt: spec.attempt,
            child,
            exit_code: None,
            stdout,
            stderr,
            started: Instant::now(),
        })
    }
}

impl ProcessHandle for TokioProcess {
    fn poll(&mut self) -> Result<ProcessPoll> {
        if self.exit_code.is_none() {
            match self.child.try_wait()? {
                None => return Ok(ProcessPoll::Running),
                Some(status) => {
                    let code = status.code().unwrap_or(-1);
                    debug!(step = %self.step, exit_code = code, "step process exited");
                    self.exit_code = Some(code);
                }
            }
        }

        // Exit observed; only report once both streams hit EOF.
        let stdout_ready = self.stdout.ready();
        let stderr_ready = self.stderr.ready();
        if !(stdout_ready && stderr_ready) {
            return Ok(ProcessPoll::Running);
        }

        Ok(ProcessPoll::Exited(RunRecord {
            step: self.step,
            attempt: self.attempt,
            exit_code: self.exit_code.unwrap_or(-1),
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
            duration: self.started.elapsed(),
        }))
    }
}
