// src/config/mod.rs

//! Run configuration (`rrmflow.toml`).
//!
//! - `model.rs`: raw TOML model and the validated [`RunConfig`].
//! - `loader.rs`: reading files, with built-in defaults when the default
//!   file is absent.
//! - `validate.rs`: `TryFrom<RawRunConfig>`: applies step overrides and
//!   checks the dependency graph.
//!
//! The shell-like `config.sh` parameter file is handled by
//! [`crate::interp`], not here.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str, load_or_default};
pub use model::{RawRunConfig, RunConfig, SchedulerSection, StepOverride};
pub use validate::parse_duration;
