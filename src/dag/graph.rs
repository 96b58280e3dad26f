// src/dag/graph.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, RrmflowError};
use crate::types::{Dependency, Step};

static NO_DEPENDENCY: Dependency = Dependency::None;

/// Static step → prerequisite mapping.
///
/// The key set *is* the step set of a run: a dependency naming a step that
/// is not a key is rejected by [`DependencyGraph::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    deps: BTreeMap<Step, Dependency>,
}

impl DependencyGraph {
    pub fn new(deps: impl IntoIterator<Item = (Step, Dependency)>) -> Self {
        Self {
            deps: deps.into_iter().collect(),
        }
    }

    /// Steps of this graph, in step order.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.deps.keys().copied()
    }

    pub fn contains(&self, step: Step) -> bool {
        self.deps.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Prerequisites of `step` (`Dependency::None` for unknown steps).
    pub fn dependency(&self, step: Step) -> &Dependency {
        self.deps.get(&step).unwrap_or(&NO_DEPENDENCY)
    }

    /// Check that every dependency is part of the step set, that no step
    /// depends on itself and that the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        for (step, dep) in &self.deps {
            for required in dep.steps() {
                if required == *step {
                    return Err(RrmflowError::DependencyCycle(format!(
                        "step '{step}' depends on itself"
                    )));
                }
                if !self.contains(required) {
                    return Err(RrmflowError::UnknownDependency {
                        step: *step,
                        dependency: required,
                    });
                }
            }
        }

        // Edge direction: prerequisite -> step.
        let mut graph: DiGraphMap<Step, ()> = DiGraphMap::new();
        for step in self.steps() {
            graph.add_node(step);
        }
        for (step, dep) in &self.deps {
            for required in dep.steps() {
                graph.add_edge(required, *step, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(RrmflowError::DependencyCycle(format!(
                "cycle detected in step dependencies involving '{}'",
                cycle.node_id()
            ))),
        }
    }
}
