//! Migration engine.
//!
//! The [`Engine`] owns a [`Registry`], a [`HistoryStore`] and the live schema
//! connection. It decides which migrations are pending or revertible, runs
//! their actions strictly one after another and keeps history in step.
//!
//! `up` walks pending migrations in ascending identity order; `down` walks
//! applied migrations in reverse application order. Either stops at the first
//! failure and reports how far it got; nothing is retried or rolled back.

mod error;
mod report;

pub use error::{BatchError, EngineError};
pub use report::{
    BatchReport, Inconsistency, MigrationState, Resolution, StatusEntry, StatusReport, Target,
    Verdict,
};

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::files::lock::AdvisoryLock;
use crate::history::{HistoryError, HistoryRecord, HistoryStore};
use crate::migration::{Action, Direction, Migration, Registry};

/// Applies and reverts migrations against one schema.
pub struct Engine<H = Box<dyn HistoryStore>> {
    registry: Registry,
    history: H,
    schema: Connection,
    lock: Option<AdvisoryLock>,
}

impl<H: HistoryStore> Engine<H> {
    pub fn new(registry: Registry, history: H, schema: Connection) -> Self {
        Self {
            registry,
            history,
            schema,
            lock: None,
        }
    }

    /// Hold `lock` for the engine's lifetime.
    ///
    /// The lock is verified before every history write; if another process
    /// has taken it over, the operation stops with [`EngineError::Lock`].
    /// Take the lock before opening the history store so the loaded state
    /// cannot go stale under another writer.
    pub fn with_lock(mut self, lock: AdvisoryLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// The lock this engine holds, if any.
    pub fn lock(&self) -> Option<&AdvisoryLock> {
        self.lock.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn schema(&self) -> &Connection {
        &self.schema
    }

    /// Ensure the history store's backing exists. Idempotent.
    ///
    /// Returns `true` if the backing was created by this call.
    pub fn init(&mut self) -> Result<bool, EngineError> {
        let created = self.history.init()?;
        if created {
            info!("history store initialized");
        }
        Ok(created)
    }

    /// Latest applied identity, if any.
    pub fn current_version(&self) -> Option<&str> {
        self.history.latest().map(|r| r.identity.as_str())
    }

    /// Whether the latest applied migration is exactly `expected`.
    pub fn is_up_to_date(&self, expected: &str) -> bool {
        self.current_version() == Some(expected)
    }

    /// Registered migrations without a history record, in identity order.
    pub fn pending(&self) -> Vec<&Migration> {
        let applied: HashSet<&str> = self
            .history
            .applied()
            .iter()
            .map(|r| r.identity.as_str())
            .collect();
        self.registry
            .all()
            .iter()
            .filter(|m| !applied.contains(m.identity()))
            .collect()
    }

    /// Snapshot of every migration's state. Never mutates anything.
    pub fn status(&self) -> StatusReport {
        let applied = self.history.applied();
        let by_identity: HashMap<&str, &HistoryRecord> =
            applied.iter().map(|r| (r.identity.as_str(), r)).collect();

        let entries = self
            .registry
            .all()
            .iter()
            .map(|m| StatusEntry {
                identity: m.identity().to_string(),
                description: m.description().to_string(),
                reversible: m.is_reversible(),
                state: match by_identity.get(m.identity()) {
                    Some(r) => MigrationState::Applied {
                        applied_at: r.applied_at,
                        order_index: r.order_index,
                    },
                    None => MigrationState::Pending,
                },
            })
            .collect();

        let orphans: Vec<HistoryRecord> = applied
            .iter()
            .filter(|r| !self.registry.contains(&r.identity))
            .cloned()
            .collect();
        for orphan in &orphans {
            warn!(identity = %orphan.identity, "applied migration is not registered");
        }

        StatusReport {
            initialized: self.history.is_initialized(),
            entries,
            orphans,
            interrupted: self.history.intent().cloned(),
            inconsistencies: check_consistency(&self.registry, applied),
            current_version: self.current_version().map(str::to_string),
        }
    }

    /// Apply pending migrations in ascending identity order.
    pub fn up(&mut self, target: Target) -> Result<BatchReport, BatchError> {
        let halt = |completed: Vec<HistoryRecord>, error: EngineError| {
            BatchError::new(Direction::Up, completed, error)
        };

        self.preflight().map_err(|e| halt(Vec::new(), e))?;
        let blocking: Vec<String> = check_consistency(&self.registry, self.history.applied())
            .iter()
            .filter(|i| i.blocks_up())
            .map(ToString::to_string)
            .collect();
        if !blocking.is_empty() {
            return Err(halt(
                Vec::new(),
                EngineError::Inconsistent {
                    detail: blocking.join("; "),
                },
            ));
        }

        let pending: Vec<String> = self
            .pending()
            .iter()
            .map(|m| m.identity().to_string())
            .collect();
        let (requested, plan) = match target {
            Target::All => (None, pending),
            Target::Count(n) => (Some(n), pending.into_iter().take(n).collect()),
            Target::To(last) => {
                self.registry
                    .lookup(&last)
                    .map_err(|e| halt(Vec::new(), e.into()))?;
                let plan = pending
                    .into_iter()
                    .filter(|id| id.as_str() <= last.as_str())
                    .collect();
                (None, plan)
            }
        };
        let shortfall = requested.map_or(0, |n| n.saturating_sub(plan.len()));
        if plan.is_empty() {
            info!("no pending migrations");
        }

        let mut completed = Vec::with_capacity(plan.len());
        for identity in plan {
            let migration = match self.registry.lookup(&identity) {
                Ok(m) => m,
                Err(e) => return Err(halt(completed, e.into())),
            };
            if let Err(e) = check_lock(self.lock.as_ref()) {
                return Err(halt(completed, e));
            }
            if let Err(e) = run_action(
                &mut self.history,
                &self.schema,
                &identity,
                Direction::Up,
                migration.forward(),
            ) {
                return Err(halt(completed, e));
            }
            if let Err(e) = check_lock(self.lock.as_ref()) {
                return Err(halt(completed, e));
            }
            match self.history.record(&identity) {
                Ok(record) => {
                    info!(identity = %record.identity, order_index = record.order_index, "applied migration");
                    completed.push(record);
                }
                Err(e) => return Err(halt(completed, e.into())),
            }
        }

        Ok(BatchReport {
            direction: Direction::Up,
            requested,
            completed,
            shortfall,
            final_version: self.current_version().map(str::to_string),
        })
    }

    /// Revert applied migrations, most recently applied first.
    pub fn down(&mut self, target: Target) -> Result<BatchReport, BatchError> {
        let halt = |completed: Vec<HistoryRecord>, error: EngineError| {
            BatchError::new(Direction::Down, completed, error)
        };

        self.preflight().map_err(|e| halt(Vec::new(), e))?;

        let applied: Vec<String> = self
            .history
            .applied()
            .iter()
            .rev()
            .map(|r| r.identity.clone())
            .collect();
        let (requested, plan) = match target {
            Target::All => (None, applied),
            Target::Count(n) => (Some(n), applied.into_iter().take(n).collect()),
            Target::To(keep) => {
                if !self.history.is_applied(&keep) {
                    return Err(halt(
                        Vec::new(),
                        HistoryError::NotApplied { identity: keep }.into(),
                    ));
                }
                let plan = applied.into_iter().take_while(|id| *id != keep).collect();
                (None, plan)
            }
        };
        let shortfall = requested.map_or(0, |n| n.saturating_sub(plan.len()));
        if shortfall > 0 {
            info!(shortfall, "fewer migrations applied than requested");
        }

        let mut completed = Vec::with_capacity(plan.len());
        for identity in plan {
            let Ok(migration) = self.registry.lookup(&identity) else {
                return Err(halt(completed, EngineError::IrreversibleOrphan { identity }));
            };
            let Some(reverse) = migration.reverse() else {
                return Err(halt(completed, EngineError::Irreversible { identity }));
            };
            if let Err(e) = check_lock(self.lock.as_ref()) {
                return Err(halt(completed, e));
            }
            if let Err(e) = run_action(
                &mut self.history,
                &self.schema,
                &identity,
                Direction::Down,
                reverse,
            ) {
                return Err(halt(completed, e));
            }
            if let Err(e) = check_lock(self.lock.as_ref()) {
                return Err(halt(completed, e));
            }
            match self.history.unrecord(&identity) {
                Ok(record) => {
                    info!(identity = %record.identity, "reverted migration");
                    completed.push(record);
                }
                Err(e) => return Err(halt(completed, e.into())),
            }
        }

        Ok(BatchReport {
            direction: Direction::Down,
            requested,
            completed,
            shortfall,
            final_version: self.current_version().map(str::to_string),
        })
    }

    /// Settle an interrupted migration using the operator's `verdict`.
    pub fn resolve(&mut self, verdict: Verdict) -> Result<Resolution, EngineError> {
        let intent = self
            .history
            .intent()
            .cloned()
            .ok_or(EngineError::NothingToResolve)?;
        check_lock(self.lock.as_ref())?;

        let history_changed = match (intent.direction, verdict) {
            (Direction::Up, Verdict::Applied) => {
                self.history.record(&intent.identity)?;
                true
            }
            (Direction::Down, Verdict::Reverted) => {
                self.history.unrecord(&intent.identity)?;
                true
            }
            _ => {
                self.history.clear_intent()?;
                false
            }
        };
        info!(identity = %intent.identity, direction = %intent.direction, ?verdict, "resolved interrupted migration");

        Ok(Resolution {
            intent,
            verdict,
            history_changed,
        })
    }

    fn preflight(&self) -> Result<(), EngineError> {
        if !self.history.is_initialized() {
            return Err(HistoryError::NotInitialized.into());
        }
        if let Some(intent) = self.history.intent() {
            warn!(identity = %intent.identity, direction = %intent.direction, "found interrupted migration");
            return Err(EngineError::Interrupted {
                identity: intent.identity.clone(),
                direction: intent.direction,
            });
        }
        Ok(())
    }
}

/// Fail if a held lock has been taken over by another process.
fn check_lock(lock: Option<&AdvisoryLock>) -> Result<(), EngineError> {
    match lock {
        Some(lock) => Ok(lock.verify()?),
        None => Ok(()),
    }
}

/// Run one action bracketed by the history intent.
///
/// The intent is written before the action starts. If the action fails the
/// intent is cleared again; on success it stays until the caller's history
/// write completes it.
fn run_action<H: HistoryStore>(
    history: &mut H,
    schema: &Connection,
    identity: &str,
    direction: Direction,
    action: &Action,
) -> Result<(), EngineError> {
    history.begin(identity, direction)?;
    debug!(identity, %direction, "running migration action");

    if let Err(cause) = action.run(schema) {
        if let Err(e) = history.clear_intent() {
            warn!(identity, error = %e, "could not clear intent after failed action");
        }
        return Err(EngineError::ActionFailure {
            identity: identity.to_string(),
            direction,
            cause,
        });
    }
    Ok(())
}

/// Compare history with the registry's ordering.
///
/// Orphaned records are ignored for ordering purposes; they are reported
/// separately by [`Engine::status`].
fn check_consistency(registry: &Registry, applied: &[HistoryRecord]) -> Vec<Inconsistency> {
    let mut found = Vec::new();

    let mut previous: Option<&HistoryRecord> = None;
    let mut previous_known: Option<&HistoryRecord> = None;
    for record in applied {
        if let Some(prev) = previous {
            if record.applied_at < prev.applied_at {
                found.push(Inconsistency::TimeReversal {
                    identity: record.identity.clone(),
                    previous: prev.identity.clone(),
                });
            }
        }
        previous = Some(record);

        if !registry.contains(&record.identity) {
            continue;
        }
        if let Some(prev) = previous_known {
            if record.identity < prev.identity {
                found.push(Inconsistency::OutOfOrder {
                    identity: record.identity.clone(),
                    previous: prev.identity.clone(),
                });
            }
        }
        previous_known = Some(record);
    }

    let applied_ids: HashSet<&str> = applied.iter().map(|r| r.identity.as_str()).collect();
    let highest = applied
        .iter()
        .map(|r| r.identity.as_str())
        .filter(|id| registry.contains(id))
        .max();
    if let Some(highest) = highest {
        for migration in registry.all() {
            if migration.identity() >= highest {
                break;
            }
            if !applied_ids.contains(migration.identity()) {
                found.push(Inconsistency::Hole {
                    missing: migration.identity().to_string(),
                    applied: highest.to_string(),
                });
            }
        }
    }

    found
}
