// src/engine/state.rs

//! Per-step status and retry bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use crate::dag::DependencyGraph;
use crate::types::{Step, StepStatus};

/// Status, retry counter and exhaustion flag of every step in a run.
///
/// The step set is fixed at construction; lookups for other steps return
/// `Unset` / `0`.
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    status: BTreeMap<Step, StepStatus>,
    retries: BTreeMap<Step, u32>,
    /// Steps that failed with no retries left.
    exhausted: BTreeSet<Step>,
}

impl StatusTable {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let status: BTreeMap<Step, StepStatus> =
            steps.into_iter().map(|s| (s, StepStatus::Unset)).collect();
        let retries = status.keys().map(|s| (*s, 0)).collect();
        Self {
            status,
            retries,
            exhausted: BTreeSet::new(),
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.status.keys().copied()
    }

    pub fn status(&self, step: Step) -> StepStatus {
        self.status.get(&step).copied().unwrap_or_default()
    }

    /// Set the status of a known step; unknown steps are ignored.
    pub fn set(&mut self, step: Step, status: StepStatus) {
        if let Some(slot) = self.status.get_mut(&step) {
            *slot = status;
        }
    }

    pub fn retries(&self, step: Step) -> u32 {
        self.retries.get(&step).copied().unwrap_or(0)
    }

    pub fn is_exhausted(&self, step: Step) -> bool {
        self.exhausted.contains(&step)
    }

    /// Steps currently in `status`, in step order.
    pub fn steps_with(&self, status: StepStatus) -> Vec<Step> {
        self.status
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(step, _)| *step)
            .collect()
    }

    /// Consume one retry for a failed step if the budget allows it and put
    /// the step back to `to-do`. Returns `false` (and marks the step
    /// exhausted) once the budget is used up.
    pub fn try_retry(&mut self, step: Step, budget: u32) -> bool {
        if self.status(step) != StepStatus::Failed {
            return false;
        }
        let used = self.retries.entry(step).or_insert(0);
        if *used < budget {
            *used += 1;
            self.set(step, StepStatus::ToDo);
            true
        } else {
            self.exhausted.insert(step);
            false
        }
    }

    /// Dependencies of `step` that are not `complete` yet.
    pub fn unmet_dependencies(&self, graph: &DependencyGraph, step: Step) -> Vec<Step> {
        graph
            .dependency(step)
            .steps()
            .into_iter()
            .filter(|d| self.status(*d) != StepStatus::Complete)
            .collect()
    }

    /// Incomplete steps that can never run: a dependency is permanently
    /// `failed`, or is itself blocked.
    pub fn blocked_steps(&self, graph: &DependencyGraph) -> BTreeSet<Step> {
        let mut blocked = BTreeSet::new();
        loop {
            let mut changed = false;
            for step in self.steps() {
                if blocked.contains(&step) || self.status(step) == StepStatus::Complete {
                    continue;
                }
                let stuck = graph.dependency(step).steps().iter().any(|d| {
                    blocked.contains(d)
                        || (self.status(*d) == StepStatus::Failed && self.is_exhausted(*d))
                });
                if stuck {
                    blocked.insert(step);
                    changed = true;
                }
            }
            if !changed {
                return blocked;
            }
        }
    }

    /// `to-do` steps that are not blocked, in step order.
    pub fn todo_steps(&self, graph: &DependencyGraph) -> Vec<Step> {
        let blocked = self.blocked_steps(graph);
        self.steps_with(StepStatus::ToDo)
            .into_iter()
            .filter(|s| !blocked.contains(s))
            .collect()
    }
}
