//! Ordered catalog of migration definitions.

use super::Migration;

/// Errors raised while building or querying a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Migration '{identity}' is already registered")]
    DuplicateIdentity { identity: String },

    #[error("Invalid migration identity '{identity}': must be non-empty and contain no whitespace")]
    InvalidIdentity { identity: String },

    #[error("Migration '{identity}' has an empty description")]
    EmptyDescription { identity: String },

    #[error("Unknown migration '{identity}'")]
    NotFound { identity: String },
}

/// All known migrations, sorted by identity.
///
/// Identities compare as plain strings, so zero-padded prefixes
/// (`001_init`, `002_add_index`, ...) give the intended order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    migrations: Vec<Migration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in migration.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        super::builtin::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Add a definition, keeping identity order.
    ///
    /// On error the registry is left untouched.
    pub fn register(&mut self, migration: Migration) -> Result<(), RegistryError> {
        let identity = migration.identity();
        if identity.is_empty() || identity.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidIdentity {
                identity: identity.to_string(),
            });
        }
        if migration.description().trim().is_empty() {
            return Err(RegistryError::EmptyDescription {
                identity: identity.to_string(),
            });
        }

        match self
            .migrations
            .binary_search_by(|m| m.identity().cmp(identity))
        {
            Ok(_) => Err(RegistryError::DuplicateIdentity {
                identity: identity.to_string(),
            }),
            Err(pos) => {
                self.migrations.insert(pos, migration);
                Ok(())
            }
        }
    }

    /// Every definition in ascending identity order.
    pub fn all(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn lookup(&self, identity: &str) -> Result<&Migration, RegistryError> {
        self.position(identity)
            .map(|pos| &self.migrations[pos])
            .ok_or_else(|| RegistryError::NotFound {
                identity: identity.to_string(),
            })
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.position(identity).is_some()
    }

    /// Index of `identity` in [`Registry::all`].
    pub fn position(&self, identity: &str) -> Option<usize> {
        self.migrations
            .binary_search_by(|m| m.identity().cmp(identity))
            .ok()
    }

    /// Highest registered identity.
    pub fn latest(&self) -> Option<&Migration> {
        self.migrations.last()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
