// src/dag/mod.rs

//! Step dependency graph.
//!
//! - [`graph`] holds the static step → [`Dependency`](crate::types::Dependency)
//!   mapping and its construction-time validation.
//! - [`standard`] describes the built-in mesh-generation pipeline.

pub mod graph;
pub mod standard;

pub use graph::DependencyGraph;
pub use standard::{StepDefinition, graph_of, standard_pipeline};
