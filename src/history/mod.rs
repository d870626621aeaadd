//! Durable record of applied migrations.
//!
//! The [`HistoryStore`] trait is the only thing the engine knows about
//! persistence. Two backends implement it:
//! - [`JsonFileHistory`] - a single JSON document rewritten atomically
//! - [`SqliteHistory`] - bookkeeping tables inside a SQLite database
//!
//! Every mutation is written durably before the in-memory view changes, so a
//! failed write never leaves the two disagreeing.
//!
//! Besides the applied records, a store keeps at most one [`Intent`]: a note
//! written before a migration action runs and cleared in the same write that
//! records (or unrecords) the migration. Finding an intent on load means the
//! previous process died between running an action and recording it.

mod json;
mod sqlite;

pub use json::JsonFileHistory;
pub use sqlite::SqliteHistory;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::migration::Direction;

/// Proof that one migration was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub identity: String,
    pub applied_at: DateTime<Utc>,
    /// Physical application order, starting at 1.
    pub order_index: u64,
}

/// A migration action that started but whose history write has not completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub identity: String,
    pub direction: Direction,
    pub started_at: DateTime<Utc>,
}

/// Errors from reading or writing migration history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("History file {} has unsupported format {found} (expected {expected})", path.display())]
    UnsupportedFormat {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("History database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid history row: {detail}")]
    InvalidRow { detail: String },

    #[error("History store is not initialized; run `smig init` first")]
    NotInitialized,

    #[error("History at {} was opened read-only", path.display())]
    ReadOnly { path: PathBuf },

    #[error("Migration '{identity}' is already recorded as applied")]
    AlreadyApplied { identity: String },

    #[error("Migration '{identity}' is not applied")]
    NotApplied { identity: String },

    #[error("Migration '{identity}' is not the most recently applied (latest is '{latest}')")]
    NotLatest { identity: String, latest: String },

    #[error("Migration '{identity}' ({direction}) is already in flight")]
    IntentPending {
        identity: String,
        direction: Direction,
    },
}

/// Persistent migration history.
pub trait HistoryStore {
    /// Path of the backing resource, if it lives on disk.
    fn location(&self) -> Option<&Path>;

    /// Whether the persistent backing exists.
    fn is_initialized(&self) -> bool;

    /// Create the persistent backing if missing.
    ///
    /// Returns `true` when something was created, `false` when it already existed.
    fn init(&mut self) -> Result<bool, HistoryError>;

    /// Applied records ordered by `order_index`.
    fn applied(&self) -> &[HistoryRecord];

    /// Append a record for `identity` with the next order index and the
    /// current time. Clears a matching `up` intent in the same write.
    fn record(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError>;

    /// Remove the record for `identity`, which must be the latest one.
    /// Clears a matching `down` intent in the same write.
    fn unrecord(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError>;

    /// The interrupted or in-flight action, if any.
    fn intent(&self) -> Option<&Intent>;

    /// Durably note that an action for `identity` is about to run.
    fn begin(&mut self, identity: &str, direction: Direction) -> Result<Intent, HistoryError>;

    /// Drop the current intent without touching the records.
    fn clear_intent(&mut self) -> Result<(), HistoryError>;

    fn latest(&self) -> Option<&HistoryRecord> {
        self.applied().last()
    }

    fn is_applied(&self, identity: &str) -> bool {
        self.applied().iter().any(|r| r.identity == identity)
    }
}

impl<H: HistoryStore + ?Sized> HistoryStore for Box<H> {
    fn location(&self) -> Option<&Path> {
        (**self).location()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn init(&mut self) -> Result<bool, HistoryError> {
        (**self).init()
    }

    fn applied(&self) -> &[HistoryRecord] {
        (**self).applied()
    }

    fn record(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        (**self).record(identity)
    }

    fn unrecord(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        (**self).unrecord(identity)
    }

    fn intent(&self) -> Option<&Intent> {
        (**self).intent()
    }

    fn begin(&mut self, identity: &str, direction: Direction) -> Result<Intent, HistoryError> {
        (**self).begin(identity, direction)
    }

    fn clear_intent(&mut self) -> Result<(), HistoryError> {
        (**self).clear_intent()
    }
}

/// Build the record `record(identity)` would append.
///
/// The timestamp is clamped to the previous record's so `applied_at` never
/// decreases, even if the wall clock steps backwards.
fn next_record(applied: &[HistoryRecord], identity: &str) -> Result<HistoryRecord, HistoryError> {
    if applied.iter().any(|r| r.identity == identity) {
        return Err(HistoryError::AlreadyApplied {
            identity: identity.to_string(),
        });
    }
    let now = Utc::now();
    let (order_index, applied_at) = match applied.last() {
        Some(last) => (last.order_index + 1, now.max(last.applied_at)),
        None => (1, now),
    };
    Ok(HistoryRecord {
        identity: identity.to_string(),
        applied_at,
        order_index,
    })
}

/// Check that `identity` may be unrecorded: it must be applied and latest.
fn check_unrecord(applied: &[HistoryRecord], identity: &str) -> Result<(), HistoryError> {
    let latest = applied.last().ok_or_else(|| HistoryError::NotApplied {
        identity: identity.to_string(),
    })?;
    if latest.identity == identity {
        return Ok(());
    }
    if applied.iter().any(|r| r.identity == identity) {
        Err(HistoryError::NotLatest {
            identity: identity.to_string(),
            latest: latest.identity.clone(),
        })
    } else {
        Err(HistoryError::NotApplied {
            identity: identity.to_string(),
        })
    }
}

/// Build a new intent, refusing if one is already pending.
fn new_intent(
    current: Option<&Intent>,
    identity: &str,
    direction: Direction,
) -> Result<Intent, HistoryError> {
    if let Some(pending) = current {
        return Err(HistoryError::IntentPending {
            identity: pending.identity.clone(),
            direction: pending.direction,
        });
    }
    Ok(Intent {
        identity: identity.to_string(),
        direction,
        started_at: Utc::now(),
    })
}

/// Whether `intent` is the one completed by recording/unrecording `identity`.
fn completes(intent: Option<&Intent>, identity: &str, direction: Direction) -> bool {
    intent.is_some_and(|i| i.identity == identity && i.direction == direction)
}
