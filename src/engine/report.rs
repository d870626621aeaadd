//! Results returned by engine operations.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::history::{HistoryRecord, Intent};
use crate::migration::Direction;

/// How far an `up` or `down` should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Everything pending (`up`) or everything applied (`down`).
    All,
    /// At most this many migrations.
    Count(usize),
    /// Until this identity is the latest applied migration.
    To(String),
}

/// Outcome of a completed `up` or `down` batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub direction: Direction,
    /// Count the caller asked for, if it asked for one.
    pub requested: Option<usize>,
    /// Records applied (`up`) or removed (`down`), in execution order.
    pub completed: Vec<HistoryRecord>,
    /// How many of `requested` could not be served because there was
    /// nothing left to apply or revert.
    pub shortfall: usize,
    /// Latest applied identity after the batch.
    pub final_version: Option<String>,
}

impl BatchReport {
    /// True when the batch had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn count(&self) -> usize {
        self.completed.len()
    }
}

/// State of one registered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applied {
        applied_at: DateTime<Utc>,
        order_index: u64,
    },
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationState::Applied { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            MigrationState::Pending => "pending",
            MigrationState::Applied { .. } => "applied",
        }
    }
}

/// One row of [`StatusReport::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub identity: String,
    pub description: String,
    pub reversible: bool,
    pub state: MigrationState,
}

/// A way in which history disagrees with the registry's ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// `missing` is pending although the later `applied` is recorded.
    Hole { missing: String, applied: String },
    /// `identity` was applied after `previous` but sorts before it.
    OutOfOrder { identity: String, previous: String },
    /// `identity` carries an earlier timestamp than the record before it.
    TimeReversal { identity: String, previous: String },
}

impl Inconsistency {
    /// Whether applying more migrations on top would break the prefix invariant.
    pub fn blocks_up(&self) -> bool {
        !matches!(self, Inconsistency::TimeReversal { .. })
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::Hole { missing, applied } => {
                write!(f, "'{missing}' is pending but later '{applied}' is applied")
            }
            Inconsistency::OutOfOrder { identity, previous } => {
                write!(f, "'{identity}' was applied after '{previous}' but sorts before it")
            }
            Inconsistency::TimeReversal { identity, previous } => {
                write!(f, "'{identity}' has an earlier applied_at than '{previous}'")
            }
        }
    }
}

/// Read-only snapshot of every migration's state.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub initialized: bool,
    /// Registered migrations in identity order.
    pub entries: Vec<StatusEntry>,
    /// History records whose migration is no longer registered.
    pub orphans: Vec<HistoryRecord>,
    /// An action that started but never had its history written.
    pub interrupted: Option<Intent>,
    pub inconsistencies: Vec<Inconsistency>,
    pub current_version: Option<String>,
}

impl StatusReport {
    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_applied()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }

    /// No pending migrations, orphans, interruptions or inconsistencies.
    pub fn is_clean(&self) -> bool {
        self.pending_count() == 0
            && self.orphans.is_empty()
            && self.interrupted.is_none()
            && self.inconsistencies.is_empty()
    }
}

/// What the operator asserts about an interrupted migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The schema contains the migration's changes.
    Applied,
    /// The schema does not contain the migration's changes.
    Reverted,
}

/// Outcome of resolving an interrupted migration.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub intent: Intent,
    pub verdict: Verdict,
    /// Whether a history record was added or removed.
    pub history_changed: bool,
}
