use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rrmflow::errors::{Result, RrmflowError};
use rrmflow::exec::{
    CapturedStream, LaunchSpec, ProcessHandle, ProcessLauncher, ProcessPoll, RunRecord,
};
use rrmflow::types::Step;

/// What one attempt of a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit with this code on the first poll.
    Exit(i32),
    /// Report `Running` for `polls` polls, then exit with `code`.
    ExitAfter { polls: u32, code: i32 },
    /// `start` fails.
    LaunchError(String),
}

/// Everything the fake launcher and its handles observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Launched { step: Step, attempt: u32 },
    LaunchFailed { step: Step, attempt: u32 },
    Exited { step: Step, attempt: u32, code: i32 },
}

type EventLog = Arc<Mutex<Vec<FakeEvent>>>;

/// Launcher that never spawns anything.
///
/// Each step consumes its scripted outcomes one attempt at a time; once a
/// step's script is used up every further attempt exits with 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    outcomes: Arc<Mutex<BTreeMap<Step, VecDeque<Outcome>>>>,
    events: EventLog,
    specs: Arc<Mutex<Vec<LaunchSpec>>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(self, step: Step, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .entry(step)
            .or_default()
            .extend(outcomes);
        self
    }

    /// Every attempt of `step` exits with `code`.
    pub fn always(self, step: Step, code: i32, attempts: usize) -> Self {
        self.with_outcomes(step, std::iter::repeat_n(Outcome::Exit(code), attempts))
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Steps in launch order (including failed launches).
    pub fn launches(&self) -> Vec<Step> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Launched { step, .. } | FakeEvent::LaunchFailed { step, .. } => {
                    Some(step)
                }
                FakeEvent::Exited { .. } => None,
            })
            .collect()
    }

    pub fn attempts_of(&self, step: Step) -> usize {
        self.launches().into_iter().filter(|s| *s == step).count()
    }

    /// Launch specs received, in order.
    pub fn specs(&self) -> Vec<LaunchSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn start(&mut self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>> {
        self.specs.lock().unwrap().push(spec.clone());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get_mut(&spec.step)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Exit(0));

        let (polls, code) = match outcome {
            Outcome::Exit(code) => (0, code),
            Outcome::ExitAfter { polls, code } => (polls, code),
            Outcome::LaunchError(message) => {
                self.events.lock().unwrap().push(FakeEvent::LaunchFailed {
                    step: spec.step,
                    attempt: spec.attempt,
                });
                return Err(RrmflowError::ProcessLaunch {
                    step: spec.step,
                    message,
                });
            }
        };

        self.events.lock().unwrap().push(FakeEvent::Launched {
            step: spec.step,
            attempt: spec.attempt,
        });

        Ok(Box::new(FakeHandle {
            step: spec.step,
            attempt: spec.attempt,
            remaining_polls: polls,
            code,
            events: Arc::clone(&self.events),
        }))
    }
}

#[derive(Debug)]
pub struct FakeHandle {
    step: Step,
    attempt: u32,
    remaining_polls: u32,
    code: i32,
    events: EventLog,
}

impl ProcessHandle for FakeHandle {
    fn poll(&mut self) -> Result<ProcessPoll> {
        if self.remaining_polls > 0 {
            self.remaining_polls -= 1;
            return Ok(ProcessPoll::Running);
        }

        self.events.lock().unwrap().push(FakeEvent::Exited {
            step: self.step,
            attempt: self.attempt,
            code: self.code,
        });

        Ok(ProcessPoll::Exited(RunRecord {
            step: self.step,
            attempt: self.attempt,
            exit_code: self.code,
            stdout: CapturedStream::Buffer(format!("{} attempt {}\n", self.step, self.attempt)),
            stderr: CapturedStream::Buffer(String::new()),
            duration: Duration::from_millis(1),
        }))
    }
}
