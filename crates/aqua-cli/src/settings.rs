//! Configuration loading for the CLI: optional TOML file, then environment.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use aqua_verifier::VerifierConfig;

/// Load `path` (or defaults) and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<VerifierConfig> {
    read_config(path)?
        .with_env()
        .context("applying environment overrides")
}

/// Load `path`, or defaults when no file was given.
fn read_config(path: Option<&Path>) -> Result<VerifierConfig> {
    let config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<VerifierConfig>(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => VerifierConfig::default(),
    };
    Ok(config)
}
