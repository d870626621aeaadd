//! Connection to the schema being migrated.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

/// How long a statement waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open or create the SQLite database at `path`.
///
/// The parent directory is created if needed. The sqlite history backend
/// opens its own connection to the same file, so WAL mode is enabled to let
/// both coexist.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
    }

    info!("opening database at {}", path.display());
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("Failed to configure database")?;
    Ok(conn)
}

/// Open the database at `path` for reading only.
///
/// Never creates or configures anything. A missing file yields an empty
/// in-memory database, which reads the same as a schema nothing has been
/// applied to.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.exists() {
        debug!("no database at {}, reading as empty", path.display());
        return Connection::open_in_memory().context("Failed to open empty database");
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .with_context(|| format!("Failed to open database read-only: {:?}", path))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}
