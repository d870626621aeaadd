//! Built-in schema migrations for the contact-message store.
//!
//! Each migration lives in its own file (`m001_init.rs`, `m002_add_index.rs`, …)
//! and exposes:
//! - `pub const IDENTITY: &str`: the sortable identity
//! - `pub fn migration() -> Migration`: the definition
//!
//! To add a new migration:
//! 1. Create `mNNN_slug.rs` with `IDENTITY` and `migration()`
//! 2. Add `mod mNNN_slug;` below
//! 3. Append its constructor to `MIGRATIONS`

mod m001_init;
mod m002_add_index;

use super::{Migration, Registry, RegistryError};

/// Built-in migration constructors, in declaration order.
#[rustfmt::skip]
const MIGRATIONS: &[fn() -> Migration] = &[
    m001_init::migration,
    m002_add_index::migration,
];

/// Register every built-in migration into `registry`.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    for build in MIGRATIONS {
        registry.register(build())?;
    }
    Ok(())
}

