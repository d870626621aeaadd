//! SQLite history backend.
//!
//! Records live in `_smig_history`, the in-flight note in the single-row
//! `_smig_intent` table. Every mutation runs in one transaction.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use super::{
    check_unrecord, completes, new_intent, next_record, HistoryError, HistoryRecord, HistoryStore,
    Intent,
};
use crate::migration::Direction;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS _smig_history (
        order_index INTEGER PRIMARY KEY,
        identity TEXT NOT NULL UNIQUE,
        applied_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS _smig_intent (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        identity TEXT NOT NULL,
        direction TEXT NOT NULL,
        started_at TEXT NOT NULL
    );";

/// History stored in SQLite bookkeeping tables.
pub struct SqliteHistory {
    conn: Connection,
    path: Option<PathBuf>,
    records: Vec<HistoryRecord>,
    intent: Option<Intent>,
    initialized: bool,
    read_only: bool,
}

impl SqliteHistory {
    /// Open (but do not create tables in) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        info!("opening sqlite history at {}", path.display());
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        Self::load(conn, Some(path))
    }

    /// Open the history at `path` without creating or changing anything.
    ///
    /// A missing file reads as an uninitialized store. Every mutation fails
    /// with [`HistoryError::ReadOnly`].
    pub fn open_read_only(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let conn = if path.exists() {
            debug!("opening sqlite history read-only at {}", path.display());
            Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            Connection::open_in_memory()?
        };
        let mut store = Self::load(conn, Some(path))?;
        store.read_only = true;
        Ok(store)
    }

    /// History in a private in-memory database.
    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::load(Connection::open_in_memory()?, None)
    }

    fn load(conn: Connection, path: Option<PathBuf>) -> Result<Self, HistoryError> {
        let mut store = Self {
            conn,
            path,
            records: Vec::new(),
            intent: None,
            initialized: false,
            read_only: false,
        };
        if store.tables_exist()? {
            store.initialized = true;
            store.records = store.read_records()?;
            store.intent = store.read_intent()?;
        }
        Ok(store)
    }

    fn tables_exist(&self) -> Result<bool, HistoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('_smig_history', '_smig_intent')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 2)
    }

    fn read_records(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, applied_at, order_index FROM _smig_history ORDER BY order_index",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, DateTime<Utc>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (identity, applied_at, order_index) = row?;
            let order_index = u64::try_from(order_index).map_err(|_| HistoryError::InvalidRow {
                detail: format!("negative order_index {order_index} for '{identity}'"),
            })?;
            records.push(HistoryRecord {
                identity,
                applied_at,
                order_index,
            });
        }
        Ok(records)
    }

    fn read_intent(&self) -> Result<Option<Intent>, HistoryError> {
        let row = self
            .conn
            .query_row(
                "SELECT identity, direction, started_at FROM _smig_intent WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(identity, direction, started_at)| {
            Ok(Intent {
                direction: parse_direction(&direction)?,
                identity,
                started_at,
            })
        })
        .transpose()
    }

    fn ensure_writable(&self) -> Result<(), HistoryError> {
        if self.read_only {
            return Err(HistoryError::ReadOnly {
                path: self.path.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), HistoryError> {
        if self.initialized {
            Ok(())
        } else {
            Err(HistoryError::NotInitialized)
        }
    }
}

fn parse_direction(value: &str) -> Result<Direction, HistoryError> {
    match value {
        "up" => Ok(Direction::Up),
        "down" => Ok(Direction::Down),
        other => Err(HistoryError::InvalidRow {
            detail: format!("unknown direction '{other}'"),
        }),
    }
}

impl HistoryStore for SqliteHistory {
    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn init(&mut self) -> Result<bool, HistoryError> {
        if self.initialized {
            return Ok(false);
        }
        self.ensure_writable()?;
        self.conn.execute_batch(SCHEMA)?;
        self.initialized = true;
        Ok(true)
    }

    fn applied(&self) -> &[HistoryRecord] {
        &self.records
    }

    fn record(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        self.ensure_writable()?;
        self.ensure_initialized()?;
        let record = next_record(&self.records, identity)?;
        let clears = completes(self.intent.as_ref(), identity, Direction::Up);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO _smig_history (order_index, identity, applied_at) VALUES (?1, ?2, ?3)",
            params![record.order_index as i64, record.identity, record.applied_at],
        )?;
        if clears {
            tx.execute("DELETE FROM _smig_intent", [])?;
        }
        tx.commit()?;
        debug!(identity, order_index = record.order_index, "history row inserted");

        self.records.push(record.clone());
        if clears {
            self.intent = None;
        }
        Ok(record)
    }

    fn unrecord(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        self.ensure_writable()?;
        self.ensure_initialized()?;
        check_unrecord(&self.records, identity)?;
        let clears = completes(self.intent.as_ref(), identity, Direction::Down);

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM _smig_history WHERE identity = ?1",
            params![identity],
        )?;
        if clears {
            tx.execute("DELETE FROM _smig_intent", [])?;
        }
        tx.commit()?;
        debug!(identity, "history row deleted");

        if clears {
            self.intent = None;
        }
        self.records.pop().ok_or_else(|| HistoryError::NotApplied {
            identity: identity.to_string(),
        })
    }

    fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    fn begin(&mut self, identity: &str, direction: Direction) -> Result<Intent, HistoryError> {
        self.ensure_writable()?;
        self.ensure_initialized()?;
        let intent = new_intent(self.intent.as_ref(), identity, direction)?;
        self.conn.execute(
            "INSERT INTO _smig_intent (id, identity, direction, started_at) VALUES (1, ?1, ?2, ?3)",
            params![intent.identity, intent.direction.to_string(), intent.started_at],
        )?;
        self.intent = Some(intent.clone());
        Ok(intent)
    }

    fn clear_intent(&mut self) -> Result<(), HistoryError> {
        self.ensure_writable()?;
        self.ensure_initialized()?;
        self.conn.execute("DELETE FROM _smig_intent", [])?;
        self.intent = None;
        Ok(())
    }
}
