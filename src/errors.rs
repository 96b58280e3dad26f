// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Per-step process failures are *not* errors at this level: they are
//! recorded in the scheduler's status table and consume retries. Only
//! configuration problems and the iteration ceiling escape as `Err`.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Step;

#[derive(Error, Debug)]
pub enum RrmflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{}:{line}: {message}", path.display())]
    ConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Command substitution `{command}` failed: {message}")]
    CommandSubstitution { command: String, message: String },

    #[error("Step '{step}' depends on '{dependency}', which is not part of this run")]
    UnknownDependency { step: Step, dependency: Step },

    #[error("Cycle detected in step dependencies: {0}")]
    DependencyCycle(String),

    #[error("Failed to launch step '{step}': {message}")]
    ProcessLaunch { step: Step, message: String },

    #[error("Scheduler exceeded max_iter = {max_iter} before all steps resolved")]
    IterationCeilingExceeded { max_iter: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RrmflowError>;
