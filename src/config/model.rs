// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::StepDefinition;
use crate::types::{DateMatch, Step};

/// Run configuration as read from `rrmflow.toml`.
///
/// ```toml
/// [scheduler]
/// retry_attempts = 2
/// sleep = "10s"
///
/// [step.map]
/// after = ["mesh"]
/// ```
///
/// All sections are optional; an empty file yields the standard pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRunConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// `[step.<name>]` overrides keyed by step name.
    #[serde(default)]
    pub step: BTreeMap<String, StepOverride>,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Directory holding the step scripts. Defaults to the directory of the
    /// TOML file.
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Shell-like parameter file, relative to `script_dir`.
    #[serde(default = "default_config_script")]
    pub config_script: PathBuf,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default)]
    pub retry_attempts: u32,

    #[serde(default = "default_max_iter")]
    pub max_iter: u64,

    /// Duration string (`"500ms"`, `"30s"`, `"2m"`); `"0s"` disables sleeping.
    #[serde(default = "default_sleep")]
    pub sleep: String,

    #[serde(default = "default_logfile")]
    pub logfile: bool,

    /// Relative to `script_dir`; an empty string disables the file.
    #[serde(default = "default_status_file")]
    pub status_file: String,

    #[serde(default)]
    pub date_match: DateMatch,

    /// Restrict the run to these steps.
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
}

fn default_config_script() -> PathBuf {
    PathBuf::from("config.sh")
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_max_iter() -> u64 {
    2880
}

fn default_sleep() -> String {
    "30s".to_string()
}

fn default_logfile() -> bool {
    true
}

fn default_status_file() -> String {
    "RRMStatus.log".to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            script_dir: None,
            config_script: default_config_script(),
            shell: default_shell(),
            retry_attempts: 0,
            max_iter: default_max_iter(),
            sleep: default_sleep(),
            logfile: default_logfile(),
            status_file: default_status_file(),
            date_match: DateMatch::default(),
            steps: None,
        }
    }
}

/// `[step.<name>]` section. Every field replaces the built-in value when set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepOverride {
    #[serde(default)]
    pub script: Option<String>,

    #[serde(default)]
    pub after: Option<Vec<Step>>,

    #[serde(default)]
    pub date_var: Option<String>,

    /// Replaces the whole output table of the step.
    #[serde(default)]
    pub outputs: Option<BTreeMap<String, String>>,
}

/// Validated run configuration.
///
/// Only constructible through `TryFrom<RawRunConfig>`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub script_dir: Option<PathBuf>,
    pub config_script: PathBuf,
    pub shell: String,
    pub retry_attempts: u32,
    pub max_iter: u64,
    pub sleep: Option<Duration>,
    pub logfile: bool,
    pub status_file: Option<PathBuf>,
    pub date_match: DateMatch,
    /// Step definitions of this run, in step order.
    pub pipeline: Vec<StepDefinition>,
}

impl RunConfig {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        sleep: Option<Duration>,
        pipeline: Vec<StepDefinition>,
    ) -> Self {
        let status_file = if scheduler.status_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(scheduler.status_file))
        };

        Self {
            script_dir: scheduler.script_dir,
            config_script: scheduler.config_script,
            shell: scheduler.shell,
            retry_attempts: scheduler.retry_attempts,
            max_iter: scheduler.max_iter,
            sleep,
            logfile: scheduler.logfile,
            status_file,
            date_match: scheduler.date_match,
            pipeline,
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.pipeline.iter().map(|d| d.step)
    }

    pub fn definition(&self, step: Step) -> Option<&StepDefinition> {
        self.pipeline.iter().find(|d| d.step == step)
    }
}
