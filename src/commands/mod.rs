//! Command handlers for the smig CLI.
//!
//! Each submodule handles one subcommand. Dispatch lives in main.rs.

pub mod check;
pub mod down;
pub mod init;
pub mod resolve;
pub mod status;
pub mod up;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use smig::config::{self, HistoryBackend};
use smig::engine::BatchError;
use smig::files::lock::AdvisoryLock;
use smig::history::HistoryStore;
use smig::{database, Config, Engine, JsonFileHistory, Registry, SqliteHistory};

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub database_path: PathBuf,
    pub history_path: PathBuf,
}

impl Settings {
    /// Load the config file named on the command line and apply overrides.
    pub fn load(cli: &smig::cli::Cli) -> Result<Self> {
        let config = Config::load(&cli.config)?;
        let base = config::base_dir(&cli.config);
        let database_path = match &cli.database {
            Some(path) => path.clone(),
            None => config.database_path(&base),
        };
        let history_path = config.history_path(&base);
        debug!(
            database = %database_path.display(),
            backend = %config.history.backend,
            "settings loaded"
        );
        Ok(Self {
            config,
            database_path,
            history_path,
        })
    }

    /// The resource the history store lives in.
    pub fn history_location(&self) -> &PathBuf {
        match self.config.history.backend {
            HistoryBackend::Json => &self.history_path,
            HistoryBackend::Sqlite => &self.database_path,
        }
    }
}

/// Build an engine for a command that changes the schema or its history.
///
/// Creates the database file if needed. `lock`, when given, is held by the
/// engine and verified before each history write.
pub fn open_engine(settings: &Settings, lock: Option<AdvisoryLock>) -> Result<Engine> {
    let registry = Registry::builtin().context("Failed to register built-in migrations")?;
    let schema = database::open(&settings.database_path)?;
    let history: Box<dyn HistoryStore> = match settings.config.history.backend {
        HistoryBackend::Json => Box::new(
            JsonFileHistory::open(&settings.history_path)
                .context("Failed to load migration history")?,
        ),
        HistoryBackend::Sqlite => Box::new(
            SqliteHistory::open(&settings.database_path)
                .context("Failed to load migration history")?,
        ),
    };
    let engine = Engine::new(registry, history, schema);
    Ok(match lock {
        Some(lock) => engine.with_lock(lock),
        None => engine,
    })
}

/// Build an engine for a command that only reports.
///
/// Nothing is created or modified on disk. A missing database or history
/// store reads as nothing applied.
pub fn open_engine_read_only(settings: &Settings) -> Result<Engine> {
    let registry = Registry::builtin().context("Failed to register built-in migrations")?;
    let schema = database::open_read_only(&settings.database_path)?;
    let history: Box<dyn HistoryStore> = match settings.config.history.backend {
        HistoryBackend::Json => Box::new(
            JsonFileHistory::open(&settings.history_path)
                .context("Failed to load migration history")?,
        ),
        HistoryBackend::Sqlite => Box::new(
            SqliteHistory::open_read_only(&settings.database_path)
                .context("Failed to load migration history")?,
        ),
    };
    Ok(Engine::new(registry, history, schema))
}

/// Take the advisory lock for a mutating command, if locking is enabled.
///
/// The lock is taken before history is loaded so the loaded state cannot go
/// stale under another writer. If the store's directory does not exist yet
/// there is nothing to guard and no lock is taken.
pub fn acquire_lock(settings: &Settings) -> Result<Option<AdvisoryLock>> {
    if !settings.config.lock.enabled {
        return Ok(None);
    }
    let location = settings.history_location();
    let dir_missing = location
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .is_some_and(|p| !p.exists());
    if dir_missing {
        debug!(location = %location.display(), "store directory missing, not locking");
        return Ok(None);
    }
    Ok(Some(AdvisoryLock::acquire(location)?))
}

/// Print what a stopped batch managed to do, then hand the error back.
pub fn report_batch_error(err: BatchError) -> anyhow::Error {
    let verb = match err.direction {
        smig::Direction::Up => "Applied",
        smig::Direction::Down => "Reverted",
    };
    for record in &err.completed {
        println!("{verb} {}", record.identity);
    }
    anyhow::Error::new(err)
}

/// Truncate a string to a maximum length, adding ellipsis if needed.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        s.chars().take(max_len).collect()
    }
}
