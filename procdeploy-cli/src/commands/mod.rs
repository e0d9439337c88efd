pub mod deploy;
pub mod records;

use std::path::Path;

use anyhow::{Context, Result};
use procdeploy_core::{DeployConfig, DEFAULT_CONFIG_FILE};

/// Load `path` when given, otherwise `procdeploy.yaml` in the working
/// directory if present, otherwise defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    match path {
        Some(path) => DeployConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => DeployConfig::discover()
            .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}")),
    }
}
