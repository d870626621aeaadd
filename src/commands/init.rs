//! Init command handler

use std::path::Path;

use anyhow::Result;

use super::{acquire_lock, open_engine, Settings};

/// Create the history store if it does not exist yet.
///
/// A config file with the effective settings is written next to it when
/// none exists, so later runs use the same paths.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings, config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        settings.config.save(config_path)?;
        println!("Wrote default config to {}", config_path.display());
    }

    let lock = acquire_lock(settings)?;
    let mut engine = open_engine(settings, lock)?;
    let location = settings.history_location().display().to_string();
    if engine.init()? {
        println!("Initialized migration history at {location}");
    } else {
        println!("Migration history already initialized at {location}");
    }
    Ok(())
}
