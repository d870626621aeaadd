//! Configuration I/O operations

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::Config;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "smig.toml";

/// Load configuration from file, or return defaults if not found
pub fn load(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Save configuration to file
pub fn save(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(config_path, contents)
        .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

    Ok(())
}
