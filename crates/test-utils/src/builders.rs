#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use rrmflow::dag::DependencyGraph;
use rrmflow::engine::{Scheduler, SchedulerOptions, StepCommands};
use rrmflow::errors::Result;
use rrmflow::exec::ProcessLauncher;
use rrmflow::manifest::OutputProbe;
use rrmflow::types::{Dependency, Step};

/// Builder for a scheduler over a hand-written step graph.
///
/// Every step gets the script `<step>.sh` run by `bash` in `/tmp`.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    deps: Vec<(Step, Dependency)>,
    options: SchedulerOptions,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            deps: Vec::new(),
            options: SchedulerOptions {
                sleep: None,
                ..SchedulerOptions::default()
            },
        }
    }

    pub fn step(mut self, step: Step, after: &[Step]) -> Self {
        self.deps
            .push((step, Dependency::from_steps(after.iter().copied())));
        self
    }

    pub fn dependency(mut self, step: Step, dep: Dependency) -> Self {
        self.deps.push((step, dep));
        self
    }

    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.options.retry_attempts = n;
        self
    }

    pub fn max_iter(mut self, n: u64) -> Self {
        self.options.max_iter = n;
        self
    }

    pub fn sleep(mut self, d: Duration) -> Self {
        self.options.sleep = Some(d);
        self
    }

    pub fn status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.status_file = Some(path.into());
        self
    }

    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::new(self.deps.iter().cloned())
    }

    pub fn commands(&self) -> StepCommands {
        self.deps.iter().fold(StepCommands::new("bash", "/tmp"), |c, (step, _)| {
            c.with_script(*step, format!("{step}.sh"))
        })
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options.clone()
    }

    pub fn build<L, P>(self, launcher: L, probe: P) -> Result<Scheduler<L, P>>
    where
        L: ProcessLauncher,
        P: OutputProbe,
    {
        Scheduler::new(self.graph(), launcher, probe, self.commands(), self.options())
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
