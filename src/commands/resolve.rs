//! Resolve command handler

use anyhow::Result;

use smig::cli::VerdictArg;

use super::{acquire_lock, open_engine, Settings};

/// Settle an interrupted migration with the operator's verdict.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings, verdict: VerdictArg) -> Result<()> {
    let lock = acquire_lock(settings)?;
    let mut engine = open_engine(settings, lock)?;

    let resolution = engine.resolve(verdict.into())?;
    let intent = &resolution.intent;
    if resolution.history_changed {
        println!(
            "Marked {} as {} (interrupted going {})",
            intent.identity,
            match intent.direction {
                smig::Direction::Up => "applied",
                smig::Direction::Down => "reverted",
            },
            intent.direction
        );
    } else {
        println!(
            "Cleared interrupted {} of {}; history unchanged",
            intent.direction, intent.identity
        );
    }
    Ok(())
}
