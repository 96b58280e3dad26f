// src/types.rs

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// One named unit of pipeline work.
///
/// The declaration order is the fixed step order: the scheduler walks
/// steps in this order when deciding what to launch, so launch order within
/// an iteration is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Mesh,
    Map,
    Domain,
    Topo,
    DryDep,
    AtmIc,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Mesh,
        Step::Map,
        Step::Domain,
        Step::Topo,
        Step::DryDep,
        Step::AtmIc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Mesh => "mesh",
            Step::Map => "map",
            Step::Domain => "domain",
            Step::Topo => "topo",
            Step::DryDep => "dry_dep",
            Step::AtmIc => "atm_ic",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Step::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown step '{}' (expected one of {})", s.trim(), known.join(", "))
            })
    }
}

/// Lifecycle status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    /// Not yet probed.
    #[default]
    Unset,
    ToDo,
    InProgress,
    Complete,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Unset => "unset",
            StepStatus::ToDo => "to-do",
            StepStatus::InProgress => "in-progress",
            StepStatus::Complete => "complete",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prerequisites of a step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dependency {
    #[default]
    None,
    Single(Step),
    Set(BTreeSet<Step>),
}

impl Dependency {
    /// Build the narrowest variant for a list of prerequisites.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let set: BTreeSet<Step> = steps.into_iter().collect();
        let mut iter = set.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Dependency::None,
            (Some(only), None) => Dependency::Single(*only),
            _ => Dependency::Set(set),
        }
    }

    /// All prerequisite steps, in step order.
    pub fn steps(&self) -> Vec<Step> {
        match self {
            Dependency::None => Vec::new(),
            Dependency::Single(step) => vec![*step],
            Dependency::Set(steps) => steps.iter().copied().collect(),
        }
    }
}

/// How the output probe treats dated file names whose exact date is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMatch {
    /// Fall back to the lexically latest file with any date in the slot.
    #[default]
    Latest,
    /// Only the exact configured date counts.
    Exact,
}

impl FromStr for DateMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(DateMatch::Latest),
            "exact" => Ok(DateMatch::Exact),
            other => Err(format!(
                "invalid date_match: {other} (expected \"latest\" or \"exact\")"
            )),
        }
    }
}
