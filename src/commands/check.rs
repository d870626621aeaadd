//! Check command handler

use anyhow::{bail, Result};

use super::{open_engine_read_only, Settings};

/// Succeed only if the latest applied migration is the expected one.
///
/// Without `--expect` the newest registered migration is expected.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings, expect: Option<&str>) -> Result<()> {
    let engine = open_engine_read_only(settings)?;
    let expected = match expect {
        Some(id) => id.to_string(),
        None => match engine.registry().latest() {
            Some(m) => m.identity().to_string(),
            None => {
                println!("Up to date (no migrations registered)");
                return Ok(());
            }
        },
    };

    if engine.is_up_to_date(&expected) {
        println!("Up to date at {expected}");
        Ok(())
    } else {
        bail!(
            "Schema is at {} but {} is expected",
            engine.current_version().unwrap_or("none"),
            expected
        )
    }
}
