// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The scheduler never touches OS process APIs directly: it asks a
//! [`ProcessLauncher`] to start a [`LaunchSpec`] and then polls the returned
//! [`ProcessHandle`] once per iteration.
//!
//! - [`TokioLauncher`] is the production implementation, built on
//!   `tokio::process` (see [`super::supervisor`]).
//! - Tests provide scripted launchers that never spawn anything.

use std::fmt::Debug;

use crate::errors::Result;
use crate::exec::record::{LaunchSpec, RunRecord};
use crate::exec::supervisor::TokioProcess;

/// Outcome of a non-blocking poll.
#[derive(Debug, Clone)]
pub enum ProcessPoll {
    Running,
    Exited(RunRecord),
}

/// A live process owned by the scheduler.
pub trait ProcessHandle: Send + Debug {
    /// Check on the process without blocking.
    ///
    /// Returns `Exited` exactly once; the caller drops the handle afterwards.
    fn poll(&mut self) -> Result<ProcessPoll>;
}

/// Starts processes for the scheduler.
pub trait ProcessLauncher: Send {
    /// Spawn the described process. Must not wait for it.
    fn start(&mut self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>>;
}

/// Real launcher used in production.
///
/// Must be used from within a tokio runtime: stream draining runs on
/// spawned tokio tasks.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher;

impl TokioLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for TokioLauncher {
    fn start(&mut self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>> {
        let process = TokioProcess::spawn(spec)?;
        Ok(Box::new(process))
    }
}
