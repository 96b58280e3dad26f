// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawRunConfig, RunConfig, SchedulerSection, StepOverride};
use crate::dag::{graph_of, standard_pipeline, StepDefinition};
use crate::errors::{Result, RrmflowError};
use crate::types::Step;

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = RrmflowError;

    fn try_from(raw: RawRunConfig) -> std::result::Result<Self, Self::Error> {
        validate_scheduler(&raw.scheduler)?;
        let sleep = parse_sleep(&raw.scheduler.sleep)?;
        let pipeline = build_pipeline(&raw)?;
        validate_pipeline(&pipeline)?;
        Ok(RunConfig::new_unchecked(raw.scheduler, sleep, pipeline))
    }
}

fn validate_scheduler(section: &SchedulerSection) -> Result<()> {
    if section.max_iter == 0 {
        return Err(RrmflowError::ConfigError(
            "[scheduler].max_iter must be >= 1 (got 0)".to_string(),
        ));
    }
    if section.shell.trim().is_empty() {
        return Err(RrmflowError::ConfigError(
            "[scheduler].shell must not be empty".to_string(),
        ));
    }
    if matches!(&section.steps, Some(steps) if steps.is_empty()) {
        return Err(RrmflowError::ConfigError(
            "[scheduler].steps must name at least one step".to_string(),
        ));
    }
    Ok(())
}

/// `None` when the interval is zero.
fn parse_sleep(s: &str) -> Result<Option<Duration>> {
    let interval = parse_duration(s).map_err(|e| {
        RrmflowError::ConfigError(format!("invalid [scheduler].sleep '{s}': {e}"))
    })?;
    Ok((!interval.is_zero()).then_some(interval))
}

/// Standard pipeline with `[step.<name>]` overrides applied, restricted to
/// `[scheduler].steps` when given.
fn build_pipeline(raw: &RawRunConfig) -> Result<Vec<StepDefinition>> {
    let mut pipeline = standard_pipeline();

    for (name, over) in &raw.step {
        let step: Step = name.parse().map_err(|e: String| {
            RrmflowError::ConfigError(format!("[step.{name}]: {e}"))
        })?;
        if let Some(def) = pipeline.iter_mut().find(|d| d.step == step) {
            apply_override(def, over);
        }
    }

    if let Some(selected) = &raw.scheduler.steps {
        pipeline.retain(|d| selected.contains(&d.step));
    }
    Ok(pipeline)
}

fn apply_override(def: &mut StepDefinition, over: &StepOverride) {
    if let Some(script) = &over.script {
        def.script = script.clone();
    }
    if let Some(after) = &over.after {
        def.after = after.clone();
    }
    if let Some(date_var) = &over.date_var {
        def.date_var = (!date_var.is_empty()).then(|| date_var.clone());
    }
    if let Some(outputs) = &over.outputs {
        def.outputs = outputs.clone();
    }
}

fn validate_pipeline(pipeline: &[StepDefinition]) -> Result<()> {
    for def in pipeline {
        if def.script.trim().is_empty() {
            return Err(RrmflowError::ConfigError(format!(
                "step '{}' has an empty script",
                def.step
            )));
        }
    }
    graph_of(pipeline).validate()
}

/// Parse a duration like `500ms`, `30s`, `2m` or `1h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ))
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
