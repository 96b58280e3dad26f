// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{RawRunConfig, RunConfig};
use crate::errors::Result;

/// Read and deserialize a TOML run configuration without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawRunConfig> {
    let config: RawRunConfig = toml::from_str(contents)?;
    Ok(config)
}

/// Load and validate a run configuration.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunConfig> {
    let raw = load_from_path(&path)?;
    RunConfig::try_from(raw)
}

/// Like [`load_and_validate`], but a missing file yields the built-in
/// defaults. Used for the default `--config` path only.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<RunConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_and_validate(path);
    }
    info!(path = %path.display(), "no run configuration found; using built-in defaults");
    RunConfig::try_from(RawRunConfig::default())
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("rrmflow.toml")
}
