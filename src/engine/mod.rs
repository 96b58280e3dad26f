// src/engine/mod.rs

//! Step scheduler for the pipeline run.
//!
//! The engine owns all mutable run state (statuses, retry counters, live
//! process handles, run records) in one [`Scheduler`] instance. Each call to
//! [`Scheduler::run_iteration`] performs one synchronous pass:
//!
//! 1. compute the launchable `to-do` set (blocked steps withheld)
//! 2. snapshot the `in-progress` set
//! 3. launch `to-do` steps whose prerequisites are all `complete`
//! 4. poll the `in-progress` snapshot and classify exits
//! 5. apply the retry policy to `failed` steps
//!
//! [`Scheduler::run`] is the async shell around it: it repeats iterations,
//! sleeping between them, until nothing is left to do.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::exec::{LaunchSpec, OutputMode};
use crate::types::Step;

pub mod report;
pub mod scheduler;
pub mod state;
pub mod status_file;

pub use report::{IterationReport, RunSummary, StepSummary};
pub use scheduler::Scheduler;
pub use state::StatusTable;
pub use status_file::StatusFile;

/// Loop policy of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Relaunches allowed per step after a failure.
    pub retry_attempts: u32,
    /// Iterations allowed before the run is aborted.
    pub max_iter: u64,
    /// Pause between iterations; `None` only yields to the runtime.
    pub sleep: Option<Duration>,
    /// Human-readable status file rewritten after every iteration.
    pub status_file: Option<PathBuf>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            retry_attempts: 0,
            max_iter: 2880,
            sleep: None,
            status_file: None,
        }
    }
}

/// How each step is turned into a process: `<shell> <script>` run inside
/// the script directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommands {
    pub shell: String,
    pub script_dir: PathBuf,
    pub scripts: BTreeMap<Step, String>,
    /// Redirect output to `<script_dir>/<step>.out` / `.err` instead of
    /// capturing it.
    pub logfile: bool,
}

impl StepCommands {
    pub fn new(shell: impl Into<String>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            script_dir: script_dir.into(),
            scripts: BTreeMap::new(),
            logfile: false,
        }
    }

    pub fn with_script(mut self, step: Step, script: impl Into<String>) -> Self {
        self.scripts.insert(step, script.into());
        self
    }

    pub fn with_logfile(mut self, logfile: bool) -> Self {
        self.logfile = logfile;
        self
    }

    pub fn script_of(&self, step: Step) -> Option<&str> {
        self.scripts.get(&step).map(String::as_str)
    }

    /// Launch description for attempt `attempt` of `step`, or `None` if no
    /// script is registered.
    pub fn launch_spec(&self, step: Step, attempt: u32) -> Option<LaunchSpec> {
        let script = self.scripts.get(&step)?;
        let output = if self.logfile {
            OutputMode::LogFiles {
                stdout: self.script_dir.join(format!("{step}.out")),
                stderr: self.script_dir.join(format!("{step}.err")),
            }
        } else {
            OutputMode::Capture
        };

        Some(LaunchSpec {
            step,
            attempt,
            program: self.shell.clone(),
            args: vec![script.clone()],
            cwd: self.script_dir.clone(),
            output,
        })
    }
}
