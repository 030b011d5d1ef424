// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::model::Config;
use crate::errors::{Result, SynthError};

/// Name of the config file discovered by walking up from the working
/// directory.
pub const CONFIG_FILE_NAME: &str = "synth.yaml";

/// Load a configuration file from a given path.
///
/// This only performs YAML deserialization; semantic validation (reference
/// resolution, id patterns, trigger shapes) happens in
/// [`crate::config::validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: Config = serde_yaml::from_str(&contents)?;

    debug!(?path, flows = config.flows.len(), "loaded config file");

    Ok(config)
}

/// Walk up from the current working directory looking for [`CONFIG_FILE_NAME`],
/// stopping after a directory that contains `.git`.
pub fn find_config_file() -> Result<PathBuf> {
    let cwd = std::env::current_dir()
        .context("determining current working directory")?;

    for dir in cwd.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }

        if dir.join(".git").exists() {
            break;
        }
    }

    Err(SynthError::Config(format!(
        "failed to find a {CONFIG_FILE_NAME} file in {} or any parent directory",
        cwd.display()
    )))
}
