//! Version command handler

use anyhow::Result;

use super::{open_engine_read_only, Settings};

/// Print the latest applied migration, or `none`.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings) -> Result<()> {
    let engine = open_engine_read_only(settings)?;
    println!("{}", engine.current_version().unwrap_or("none"));
    Ok(())
}
