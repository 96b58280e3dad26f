// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rrmflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rrmflow",
    version,
    about = "Run the regionally-refined-mesh generation pipeline step by step.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run configuration (TOML).
    ///
    /// Default: `rrmflow.toml` in the current working directory; if that
    /// file does not exist the built-in pipeline is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding `config.sh` and the step scripts.
    #[arg(long, value_name = "DIR")]
    pub script_dir: Option<PathBuf>,

    /// Relaunches allowed per failed step.
    #[arg(long, value_name = "N")]
    pub retry_attempts: Option<u32>,

    /// Iterations before the run is aborted.
    #[arg(long, value_name = "N")]
    pub max_iter: Option<u64>,

    /// Pause between iterations (e.g. `30s`, `500ms`, `0s`).
    #[arg(long, value_name = "DURATION")]
    pub sleep: Option<String>,

    /// Capture step output in memory instead of `<step>.out` / `<step>.err`.
    #[arg(long)]
    pub no_logfile: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RRMFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse config, probe outputs and print the plan without launching
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
