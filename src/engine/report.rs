// src/engine/report.rs

use std::collections::BTreeMap;

use crate::exec::RunRecord;
use crate::types::{Step, StepStatus};

/// What a single scheduler iteration did, mainly for tests and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub iteration: u64,
    /// Steps launched (or whose launch was attempted) this iteration.
    pub launched: Vec<Step>,
    /// Steps whose process exited this iteration, with exit codes.
    pub finished: Vec<(Step, i32)>,
    /// Failed steps put back to `to-do`.
    pub retried: Vec<Step>,
    /// Failed steps that ran out of retries this iteration.
    pub exhausted: Vec<Step>,
    /// Nothing is left to launch or poll.
    pub done: bool,
}

/// Final state of one step.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub status: StepStatus,
    pub retries: u32,
    /// Never launched because a prerequisite failed permanently.
    pub blocked: bool,
    pub records: Vec<RunRecord>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub iterations: u64,
    pub steps: BTreeMap<Step, StepSummary>,
}

impl RunSummary {
    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps.get(&step).map(|s| s.status)
    }

    /// Steps that ended permanently `failed`.
    pub fn failed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, s)| s.status == StepStatus::Failed)
            .map(|(step, _)| *step)
            .collect()
    }

    pub fn blocked_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, s)| s.blocked)
            .map(|(step, _)| *step)
            .collect()
    }

    pub fn all_complete(&self) -> bool {
        self.steps.values().all(|s| s.status == StepStatus::Complete)
    }
}
