//! Up command handler

use anyhow::Result;

use smig::cli::StepArgs;

use super::{acquire_lock, open_engine, report_batch_error, Settings};

/// Apply pending migrations.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings, args: &StepArgs) -> Result<()> {
    let lock = acquire_lock(settings)?;
    let mut engine = open_engine(settings, lock)?;

    let report = engine.up(args.target()).map_err(report_batch_error)?;
    if report.is_noop() {
        println!("Nothing to migrate");
    } else {
        for record in &report.completed {
            println!("Applied {}", record.identity);
        }
        println!("Applied {} migration(s)", report.count());
    }
    println!(
        "Current version: {}",
        report.final_version.as_deref().unwrap_or("none")
    );
    Ok(())
}
