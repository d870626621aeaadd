//! Configuration management for smig

mod io;
mod types;

pub use io::DEFAULT_CONFIG_FILE;
pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from `path`, or return defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        io::load(path)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        io::save(self, path)
    }

    /// Database path, relative paths resolved against `base`
    pub fn database_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.database.path)
    }

    /// JSON history path, relative paths resolved against `base`
    pub fn history_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.history.path)
    }
}

/// Directory that relative paths in the config file at `config_path` are
/// resolved against.
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
