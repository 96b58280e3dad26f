// src/engine/scheduler.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::DependencyGraph;
use crate::engine::report::{IterationReport, RunSummary, StepSummary};
use crate::engine::state::StatusTable;
use crate::engine::status_file::StatusFile;
use crate::engine::{SchedulerOptions, StepCommands};
use crate::errors::{Result, RrmflowError};
use crate::exec::{ProcessHandle, ProcessLauncher, ProcessPoll, RunRecord};
use crate::fs::{FileSystem, RealFileSystem};
use crate::manifest::OutputProbe;
use crate::types::{Step, StepStatus};

/// Drives one pipeline run.
///
/// `L` starts processes, `P` answers "do this step's outputs exist" and is
/// refreshed after every finished process.
#[derive(Debug)]
pub struct Scheduler<L, P> {
    graph: DependencyGraph,
    launcher: L,
    probe: P,
    commands: StepCommands,
    options: SchedulerOptions,
    table: StatusTable,
    running: BTreeMap<Step, Box<dyn ProcessHandle>>,
    records: BTreeMap<Step, Vec<RunRecord>>,
    status_file: Option<StatusFile>,
    iteration: u64,
    initialized: bool,
}

impl<L, P> Scheduler<L, P>
where
    L: ProcessLauncher,
    P: OutputProbe,
{
    /// Validate the graph and build a scheduler.
    ///
    /// Fails with `UnknownDependency` / `DependencyCycle` for a bad graph and
    /// with `ConfigError` when a step has no script.
    pub fn new(
        graph: DependencyGraph,
        launcher: L,
        probe: P,
        commands: StepCommands,
        options: SchedulerOptions,
    ) -> Result<Self> {
        graph.validate()?;

        if let Some(step) = graph.steps().find(|s| commands.script_of(*s).is_none()) {
            return Err(RrmflowError::ConfigError(format!(
                "no script configured for step '{step}'"
            )));
        }
        if options.max_iter == 0 {
            return Err(RrmflowError::ConfigError(
                "max_iter must be at least 1".to_string(),
            ));
        }

        let status_file = options
            .status_file
            .clone()
            .map(|path| StatusFile::new(path, Arc::new(RealFileSystem) as Arc<dyn FileSystem>));

        Ok(Self {
            table: StatusTable::new(graph.steps()),
            graph,
            launcher,
            probe,
            commands,
            options,
            running: BTreeMap::new(),
            records: BTreeMap::new(),
            status_file,
            iteration: 0,
            initialized: false,
        })
    }

    /// Write the status file through `fs` instead of the real filesystem.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.status_file = self
            .options
            .status_file
            .clone()
            .map(|path| StatusFile::new(path, fs));
        self
    }

    /// Seed every step as `complete` (outputs present) or `to-do`.
    ///
    /// Runs once; later calls are no-ops.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let present = self.probe.probe()?;
        let steps: Vec<Step> = self.graph.steps().collect();
        for step in steps {
            let status = if present.get(&step).copied().unwrap_or(false) {
                StepStatus::Complete
            } else {
                StepStatus::ToDo
            };
            info!(step = %step, status = %status, "initial status");
            self.table.set(step, status);
        }

        self.initialized = true;
        Ok(())
    }

    /// One pass of the run loop.
    pub fn run_iteration(&mut self) -> Result<IterationReport> {
        self.initialize()?;

        self.iteration += 1;
        if self.iteration > self.options.max_iter {
            return Err(RrmflowError::IterationCeilingExceeded {
                max_iter: self.options.max_iter,
            });
        }

        let mut report = IterationReport {
            iteration: self.iteration,
            ..IterationReport::default()
        };

        let todo = self.table.todo_steps(&self.graph);
        let in_progress = self.table.steps_with(StepStatus::InProgress);

        for step in todo {
            let unmet = self.table.unmet_dependencies(&self.graph, step);
            if !unmet.is_empty() {
                debug!(step = %step, ?unmet, "dependency unmet; waiting");
                continue;
            }
            self.launch(step);
            report.launched.push(step);
        }

        for step in in_progress {
            if let Some(code) = self.poll(step) {
                report.finished.push((step, code));
            }
        }

        for step in self.table.steps_with(StepStatus::Failed) {
            if self.table.is_exhausted(step) {
                continue;
            }
            if self.table.try_retry(step, self.options.retry_attempts) {
                info!(
                    step = %step,
                    retry = self.table.retries(step),
                    budget = self.options.retry_attempts,
                    "retrying step"
                );
                report.retried.push(step);
            } else {
                warn!(
                    step = %step,
                    retries = self.table.retries(step),
                    "step failed permanently"
                );
                report.exhausted.push(step);
            }
        }

        report.done = self.is_finished();

        if let Some(file) = &self.status_file {
            file.write(self.iteration, &self.table, &self.graph);
        }

        debug!(
            iteration = self.iteration,
            launched = report.launched.len(),
            finished = report.finished.len(),
            done = report.done,
            "iteration finished"
        );
        Ok(report)
    }

    /// Run iterations until nothing is left to launch or poll.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.initialize()?;
        info!(steps = self.graph.len(), "starting run");

        loop {
            let report = self.run_iteration()?;
            if report.done {
                break;
            }
            match self.options.sleep {
                Some(interval) => tokio::time::sleep(interval).await,
                None => tokio::task::yield_now().await,
            }
        }

        let summary = self.summary();
        info!(
            iterations = summary.iterations,
            failed = summary.failed_steps().len(),
            "run finished"
        );
        Ok(summary)
    }

    fn launch(&mut self, step: Step) {
        let attempt = self.table.retries(step) + 1;
        let Some(spec) = self.commands.launch_spec(step, attempt) else {
            // Checked in `new`.
            return;
        };

        info!(step = %step, attempt, command = %spec.command_line(), "launching step");
        match self.launcher.start(&spec) {
            Ok(handle) => {
                self.running.insert(step, handle);
                self.table.set(step, StepStatus::InProgress);
            }
            Err(e) => {
                warn!(step = %step, attempt, error = %e, "launch failed");
                let record = RunRecord::launch_failure(&spec, e.to_string());
                self.records.entry(step).or_default().push(record);
                self.table.set(step, StepStatus::Failed);
            }
        }
    }

    /// Poll a running step. Returns its exit code once it has exited.
    fn poll(&mut self, step: Step) -> Option<i32> {
        let Some(handle) = self.running.get_mut(&step) else {
            warn!(step = %step, "in-progress step has no process handle");
            self.table.set(step, StepStatus::Failed);
            return Some(-1);
        };

        let record = match handle.poll() {
            Ok(ProcessPoll::Running) => return None,
            Ok(ProcessPoll::Exited(record)) => record,
            Err(e) => {
                warn!(step = %step, error = %e, "failed to poll step process");
                let attempt = self.table.retries(step) + 1;
                let spec = self.commands.launch_spec(step, attempt)?;
                RunRecord::launch_failure(&spec, e.to_string())
            }
        };
        self.running.remove(&step);

        let code = record.exit_code;
        let status = if record.success() {
            StepStatus::Complete
        } else {
            StepStatus::Failed
        };
        info!(
            step = %step,
            exit_code = code,
            duration_ms = record.duration.as_millis() as u64,
            status = %status,
            "step finished"
        );
        self.table.set(step, status);
        self.records.entry(step).or_default().push(record);

        if let Err(e) = self.probe.refresh() {
            warn!(step = %step, error = %e, "failed to refresh output listing");
        }
        Some(code)
    }

    /// No launchable `to-do` step and no `in-progress` step remain.
    pub fn is_finished(&self) -> bool {
        self.initialized
            && self.table.todo_steps(&self.graph).is_empty()
            && self.table.steps_with(StepStatus::InProgress).is_empty()
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn status_table(&self) -> &StatusTable {
        &self.table
    }

    pub fn status_of(&self, step: Step) -> StepStatus {
        self.table.status(step)
    }

    pub fn retries_of(&self, step: Step) -> u32 {
        self.table.retries(step)
    }

    pub fn records_of(&self, step: Step) -> &[RunRecord] {
        self.records.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_record(&self, step: Step) -> Option<&RunRecord> {
        self.records.get(&step).and_then(|r| r.last())
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn summary(&self) -> RunSummary {
        let blocked = self.table.blocked_steps(&self.graph);
        let steps = self
            .table
            .steps()
            .map(|step| {
                let summary = StepSummary {
                    status: self.table.status(step),
                    retries: self.table.retries(step),
                    blocked: blocked.contains(&step),
                    records: self.records_of(step).to_vec(),
                };
                (step, summary)
            })
            .collect();

        RunSummary {
            iterations: self.iteration,
            steps,
        }
    }
}
