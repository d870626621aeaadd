//! Test helper utilities

#![allow(dead_code)]

use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;

use smig::{Action, Engine, JsonFileHistory, Migration, Registry, SqliteHistory};

/// A reversible migration creating table `t_<identity>`.
pub fn table_migration(identity: &str) -> Migration {
    Migration::new(
        identity,
        format!("create t_{identity}"),
        Action::sql(format!("CREATE TABLE t_{identity} (id INTEGER PRIMARY KEY);")),
    )
    .with_reverse(Action::sql(format!("DROP TABLE t_{identity};")))
}

/// A migration whose forward action always fails.
pub fn failing_migration(identity: &str) -> Migration {
    Migration::new(
        identity,
        "always fails",
        Action::custom(|_| anyhow::bail!("boom")),
    )
    .with_reverse(Action::sql("DROP TABLE IF EXISTS never_created;"))
}

/// Zero-padded identities `001_m` .. `<n>_m`.
pub fn identities(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{i:03}_m")).collect()
}

pub fn registry_of(migrations: Vec<Migration>) -> Registry {
    let mut registry = Registry::new();
    for migration in migrations {
        registry.register(migration).unwrap();
    }
    registry
}

/// Initialized engine with in-memory history and schema.
pub fn memory_engine(registry: Registry) -> Engine<SqliteHistory> {
    let mut engine = Engine::new(
        registry,
        SqliteHistory::in_memory().unwrap(),
        Connection::open_in_memory().unwrap(),
    );
    engine.init().unwrap();
    engine
}

/// Scratch directory holding a database and a JSON history file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("app.db")
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.path().join("migrations").join("migrations.json")
    }

    pub fn history(&self) -> JsonFileHistory {
        JsonFileHistory::open(self.history_path()).unwrap()
    }

    /// Open an engine over the on-disk database and JSON history.
    pub fn engine(&self, registry: Registry) -> Engine<JsonFileHistory> {
        let schema = smig::database::open(&self.database_path()).unwrap();
        Engine::new(registry, self.history(), schema)
    }
}

/// Whether `table` exists in the schema.
pub fn has_table(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}

/// Number of indexes on `contact_messages` created by migrations.
pub fn contact_index_count(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'index' AND tbl_name = 'contact_messages' AND name LIKE 'ix_%'",
        [],
        |row| row.get(0),
    )
    .unwrap()
}
