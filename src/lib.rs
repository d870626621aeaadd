//! smig - a schema migration manager for SQLite databases
//!
//! Migrations are registered in a [`Registry`], applied and reverted by an
//! [`Engine`], and tracked by a [`HistoryStore`] that survives restarts.

pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod files;
pub mod history;
pub mod migration;

pub use config::Config;
pub use engine::{BatchError, BatchReport, Engine, EngineError, StatusReport, Target, Verdict};
pub use history::{HistoryError, HistoryRecord, HistoryStore, JsonFileHistory, SqliteHistory};
pub use migration::{Action, Direction, Migration, Registry, RegistryError};
