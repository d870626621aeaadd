//! Down command handler

use anyhow::Result;

use smig::cli::DownArgs;

use super::{acquire_lock, open_engine, report_batch_error, Settings};

/// Revert applied migrations, one by default.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings, args: &DownArgs) -> Result<()> {
    let lock = acquire_lock(settings)?;
    let mut engine = open_engine(settings, lock)?;

    let report = engine.down(args.target()).map_err(report_batch_error)?;
    if report.is_noop() {
        println!("Nothing to revert");
    } else {
        for record in &report.completed {
            println!("Reverted {}", record.identity);
        }
        println!("Reverted {} migration(s)", report.count());
    }
    if report.shortfall > 0 {
        println!(
            "Requested {} but only {} were applied",
            report.requested.unwrap_or_default(),
            report.count()
        );
    }
    println!(
        "Current version: {}",
        report.final_version.as_deref().unwrap_or("none")
    );
    Ok(())
}
