//! Engine error types.
//!
//! Every variant names the migration and direction involved where one exists,
//! so an operator can reconcile the schema by hand.

use crate::files::lock::LockError;
use crate::history::{HistoryError, HistoryRecord};
use crate::migration::{Direction, RegistryError};

/// Failure of a single engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// A forward or reverse action returned an error. The batch stops here.
    #[error("Migration '{identity}' failed going {direction}: {cause:#}")]
    ActionFailure {
        identity: String,
        direction: Direction,
        cause: anyhow::Error,
    },

    #[error("Cannot revert '{identity}': it is applied but no longer registered")]
    IrreversibleOrphan { identity: String },

    #[error("Cannot revert '{identity}': it has no reverse action")]
    Irreversible { identity: String },

    #[error(
        "Migration '{identity}' ({direction}) was interrupted before its history was written; \
         inspect the schema, then run `smig resolve applied` or `smig resolve reverted`"
    )]
    Interrupted {
        identity: String,
        direction: Direction,
    },

    #[error("History is inconsistent with the registered migrations: {detail}")]
    Inconsistent { detail: String },

    #[error("No interrupted migration to resolve")]
    NothingToResolve,
}

/// An `up` or `down` batch that stopped before finishing.
///
/// `completed` holds the records applied (or reverted) before `error`.
#[derive(Debug, thiserror::Error)]
#[error("{}{}", .error, progress_note(.direction, .completed))]
pub struct BatchError {
    pub direction: Direction,
    pub completed: Vec<HistoryRecord>,
    pub error: EngineError,
}

impl BatchError {
    pub(crate) fn new(
        direction: Direction,
        completed: Vec<HistoryRecord>,
        error: impl Into<EngineError>,
    ) -> Self {
        Self {
            direction,
            completed,
            error: error.into(),
        }
    }

    /// Identity of the migration the batch stopped on, when there is one.
    pub fn failed_identity(&self) -> Option<&str> {
        match &self.error {
            EngineError::ActionFailure { identity, .. }
            | EngineError::IrreversibleOrphan { identity }
            | EngineError::Irreversible { identity }
            | EngineError::Interrupted { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

fn progress_note(direction: &Direction, completed: &[HistoryRecord]) -> String {
    if completed.is_empty() {
        return String::new();
    }
    let verb = match direction {
        Direction::Up => "applied",
        Direction::Down => "reverted",
    };
    format!(" ({} migration(s) {verb} before the failure)", completed.len())
}
