//! Migration definitions.
//!
//! A [`Migration`] is an immutable description of one schema change: an
//! identity that orders it against every other migration, a description for
//! operators, a forward action and an optional reverse action.
//!
//! Definitions are collected in a [`Registry`] by explicit registration
//! calls (see [`builtin`]); nothing is discovered at runtime.

pub mod builtin;
mod registry;

pub use registry::{Registry, RegistryError};

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Signature of a custom migration step.
pub type ActionFn = dyn Fn(&Connection) -> anyhow::Result<()> + Send + Sync;

/// Direction a migration is travelling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One step of a migration, executed against the live schema.
#[derive(Clone)]
pub enum Action {
    /// A SQL batch, run inside a single transaction.
    Sql(Cow<'static, str>),
    /// Arbitrary Rust code receiving the schema connection.
    Custom(Arc<ActionFn>),
}

impl Action {
    /// Build a SQL action.
    pub fn sql(sql: impl Into<Cow<'static, str>>) -> Self {
        Action::Sql(sql.into())
    }

    /// Build a custom action from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Connection) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Action::Custom(Arc::new(f))
    }

    /// Run the action against `conn`.
    ///
    /// SQL batches are wrapped in a transaction so a failing statement leaves
    /// the schema as it was. Custom actions manage their own transactions.
    pub fn run(&self, conn: &Connection) -> anyhow::Result<()> {
        match self {
            Action::Sql(sql) => {
                let tx = conn.unchecked_transaction()?;
                tx.execute_batch(sql)?;
                tx.commit()?;
                Ok(())
            }
            Action::Custom(f) => f(conn),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Action::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// An immutable, registered schema change.
#[derive(Debug, Clone)]
pub struct Migration {
    identity: String,
    description: String,
    forward: Action,
    reverse: Option<Action>,
}

impl Migration {
    /// Create an irreversible migration. Chain [`Migration::with_reverse`] to
    /// make it revertible.
    pub fn new(identity: impl Into<String>, description: impl Into<String>, forward: Action) -> Self {
        Self {
            identity: identity.into(),
            description: description.into(),
            forward,
            reverse: None,
        }
    }

    /// Attach the action that undoes `forward`.
    pub fn with_reverse(mut self, reverse: Action) -> Self {
        self.reverse = Some(reverse);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn forward(&self) -> &Action {
        &self.forward
    }

    pub fn reverse(&self) -> Option<&Action> {
        self.reverse.as_ref()
    }

    pub fn is_reversible(&self) -> bool {
        self.reverse.is_some()
    }
}
