// src/exec/mod.rs

//! Process execution layer.
//!
//! Each step attempt is one external process. The scheduler starts it and
//! then polls it without blocking until it exits.
//!
//! - [`backend`] defines the `ProcessLauncher` / `ProcessHandle` traits and
//!   the production `TokioLauncher`.
//! - [`supervisor`] wraps a `tokio::process::Child` with stream capture.
//! - [`record`] holds `LaunchSpec`, `RunRecord` and friends.

pub mod backend;
pub mod record;
pub mod supervisor;

pub use backend::{ProcessHandle, ProcessLauncher, ProcessPoll, TokioLauncher};
pub use record::{CapturedStream, LaunchSpec, OutputMode, RunRecord};
pub use supervisor::TokioProcess;
