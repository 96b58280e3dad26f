// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod interp;
pub mod logging;
pub mod manifest;
pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, load_or_default, parse_duration, RunConfig};
use crate::dag::{graph_of, StepDefinition};
use crate::engine::{RunSummary, Scheduler, SchedulerOptions, StepCommands};
use crate::exec::{ProcessLauncher, TokioLauncher};
use crate::fs::{FileSystem, RealFileSystem};
use crate::interp::{ConfigInterpreter, VariableMap};
use crate::manifest::{OutputManifest, OutputProbe};
use crate::types::Step;

/// High-level entry point used by `main.rs`.
///
/// Loads `rrmflow.toml`, applies CLI overrides, interprets `config.sh`,
/// probes existing outputs and runs the scheduler. Permanently failed steps
/// are reported as an error.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => load_or_default(&config_path)?,
    };
    apply_cli_overrides(&mut cfg, &args)?;

    let script_dir = resolve_script_dir(&cfg, &config_path);
    let config_script = script_dir.join(&cfg.config_script);
    info!(script_dir = %script_dir.display(), config = %config_script.display(), "loading parameters");

    let vars = ConfigInterpreter::new().parse_file(&config_script)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut manifest = build_manifest(&cfg, &vars, fs);

    if args.dry_run {
        let present = manifest.probe()?;
        print_dry_run(&cfg, &script_dir, &vars, &present);
        return Ok(());
    }

    let summary = run_pipeline(&cfg, &script_dir, TokioLauncher::new(), manifest).await?;

    let failed = summary.failed_steps();
    if !failed.is_empty() {
        let names: Vec<_> = failed.iter().map(|s| s.as_str()).collect();
        bail!("steps failed permanently: {}", names.join(", "));
    }
    Ok(())
}

/// Build the scheduler for `cfg` and drive it to completion.
pub async fn run_pipeline<L, P>(
    cfg: &RunConfig,
    script_dir: &Path,
    launcher: L,
    probe: P,
) -> crate::errors::Result<RunSummary>
where
    L: ProcessLauncher,
    P: OutputProbe,
{
    let graph = graph_of(&cfg.pipeline);
    let mut commands = StepCommands::new(cfg.shell.clone(), script_dir).with_logfile(cfg.logfile);
    for def in &cfg.pipeline {
        commands = commands.with_script(def.step, def.script.clone());
    }

    let options = SchedulerOptions {
        retry_attempts: cfg.retry_attempts,
        max_iter: cfg.max_iter,
        sleep: cfg.sleep,
        status_file: cfg.status_file.as_ref().map(|f| script_dir.join(f)),
    };

    let mut scheduler = Scheduler::new(graph, launcher, probe, commands, options)?;
    scheduler.run().await
}

/// Output manifest for the steps of `cfg`.
pub fn build_manifest(cfg: &RunConfig, vars: &VariableMap, fs: Arc<dyn FileSystem>) -> OutputManifest {
    OutputManifest::new(
        vars,
        cfg.pipeline.iter().map(StepDefinition::output_spec),
        fs,
        cfg.date_match,
    )
}

fn apply_cli_overrides(cfg: &mut RunConfig, args: &CliArgs) -> Result<()> {
    if let Some(dir) = &args.script_dir {
        cfg.script_dir = Some(dir.clone());
    }
    if let Some(n) = args.retry_attempts {
        cfg.retry_attempts = n;
    }
    if let Some(n) = args.max_iter {
        if n == 0 {
            bail!("--max-iter must be >= 1");
        }
        cfg.max_iter = n;
    }
    if let Some(s) = &args.sleep {
        let interval = parse_duration(s).map_err(|e| anyhow::anyhow!("invalid --sleep '{s}': {e}"))?;
        cfg.sleep = (!interval.is_zero()).then_some(interval);
    }
    if args.no_logfile {
        cfg.logfile = false;
    }
    Ok(())
}

/// Explicit `script_dir`, else the directory of the run configuration.
fn resolve_script_dir(cfg: &RunConfig, config_path: &Path) -> PathBuf {
    match &cfg.script_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => config_root_dir(config_path).join(dir),
        None => config_root_dir(config_path),
    }
}

/// Directory containing the config file, or the current directory for a
/// bare file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print parameters, steps, dependencies and probe results.
fn print_dry_run(
    cfg: &RunConfig,
    script_dir: &Path,
    vars: &VariableMap,
    present: &BTreeMap<Step, bool>,
) {
    println!("rrmflow dry-run");
    println!("  script_dir = {}", script_dir.display());
    println!("  shell = {}", cfg.shell);
    println!("  retry_attempts = {}", cfg.retry_attempts);
    println!("  max_iter = {}", cfg.max_iter);
    match cfg.sleep {
        Some(d) => println!("  sleep = {d:?}"),
        None => println!("  sleep = none"),
    }
    println!();

    println!("variables ({}):", vars.len());
    for (key, value) in vars {
        println!("  {key} = {value}");
    }
    println!();

    println!("steps ({}):", cfg.pipeline.len());
    for def in &cfg.pipeline {
        let done = present.get(&def.step).copied().unwrap_or(false);
        println!("  - {}", def.step);
        println!("      script: {}", def.script);
        if !def.after.is_empty() {
            let after: Vec<_> = def.after.iter().map(|s| s.as_str()).collect();
            println!("      after: {}", after.join(", "));
        }
        if let Some(var) = &def.date_var {
            println!("      date_var: {var}");
        }
        println!("      outputs present: {done}");
    }

    debug!("dry-run complete (no execution)");
}
