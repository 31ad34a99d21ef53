//! Config store for loading config.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::ArctlConfig;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store in the platform config directory (`<config>/arctl/config.toml`).
    pub fn from_default_dir() -> anyhow::Result<Self> {
        let global_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("arctl");
        Ok(Self::from_dir(global_dir))
    }

    pub fn from_dir(global_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: global_dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config, or defaults if the file does not exist.
    pub fn load(&self) -> anyhow::Result<ArctlConfig> {
        if !self.config_path.exists() {
            return Ok(ArctlConfig::default());
        }
        let content = std::fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!("Failed to parse config file: {}", self.config_path.display())
        })
    }
}
