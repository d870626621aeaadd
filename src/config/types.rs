//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

/// The database whose schema is migrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

pub fn default_database_path() -> String {
    "portfolio.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Where applied migrations are recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// A JSON document at `history.path`
    #[default]
    Json,
    /// Bookkeeping tables inside the migrated database
    Sqlite,
}

impl fmt::Display for HistoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryBackend::Json => write!(f, "json"),
            HistoryBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// History store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    /// JSON history file; ignored by the sqlite backend
    #[serde(default = "default_history_path")]
    pub path: String,
}

pub fn default_history_path() -> String {
    "migrations/migrations.json".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::default(),
            path: default_history_path(),
        }
    }
}

/// Advisory locking around `up`, `down` and `resolve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_enabled")]
    pub enabled: bool,
}

pub fn default_lock_enabled() -> bool {
    true
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: default_lock_enabled(),
        }
    }
}

impl Config {
    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.database.path.trim().is_empty() {
            return Err("database.path must not be empty".to_string());
        }
        if self.history.backend == HistoryBackend::Json && self.history.path.trim().is_empty() {
            return Err("history.path must not be empty for the json backend".to_string());
        }
        Ok(())
    }
}
