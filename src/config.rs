use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path))?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file is missing or
    /// unparseable. The pipeline must come up even without a config file.
    pub fn load_or_default(path: &str) -> Self {
        if !Path::new(path).exists() {
            warn!("Config file {} not found, using defaults", path);
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Error loading config: {e:#}, using defaults");
                Self::default()
            }
        }
    }
}
