//! Status command handler

use anyhow::Result;

use smig::engine::{MigrationState, StatusReport};

use super::{open_engine_read_only, truncate_string, Settings};

const DESCRIPTION_WIDTH: usize = 44;

/// Print every registered migration with its state, then any problems.
#[cfg(not(tarpaulin_include))]
pub fn handle(settings: &Settings) -> Result<()> {
    let engine = open_engine_read_only(settings)?;
    let report = engine.status();
    print!("{}", render(&report));
    Ok(())
}

/// Render a status report as a plain-text table.
pub fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    if !report.initialized {
        out.push_str("History store not initialized; run `smig init`\n");
    }

    let id_width = report
        .entries
        .iter()
        .map(|e| e.identity.len())
        .chain(std::iter::once("IDENTITY".len()))
        .max()
        .unwrap_or_default();

    out.push_str(&format!(
        "{:<id_width$}  {:<DESCRIPTION_WIDTH$}  {:<8}  APPLIED AT\n",
        "IDENTITY", "DESCRIPTION", "STATE"
    ));
    for entry in &report.entries {
        let applied_at = match &entry.state {
            MigrationState::Applied { applied_at, .. } => {
                applied_at.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            MigrationState::Pending => "-".to_string(),
        };
        let mut description = truncate_string(&entry.description, DESCRIPTION_WIDTH);
        if !entry.reversible {
            description = truncate_string(&format!("{description} [irreversible]"), DESCRIPTION_WIDTH);
        }
        out.push_str(&format!(
            "{:<id_width$}  {:<DESCRIPTION_WIDTH$}  {:<8}  {}\n",
            entry.identity,
            description,
            entry.state.label(),
            applied_at
        ));
    }

    out.push_str(&format!(
        "\n{} applied, {} pending. Current version: {}\n",
        report.applied_count(),
        report.pending_count(),
        report.current_version.as_deref().unwrap_or("none")
    ));

    for orphan in &report.orphans {
        out.push_str(&format!(
            "warning: {} is applied but not registered (orphan)\n",
            orphan.identity
        ));
    }
    if let Some(intent) = &report.interrupted {
        out.push_str(&format!(
            "warning: {} was interrupted going {} at {}; run `smig resolve applied|reverted`\n",
            intent.identity,
            intent.direction,
            intent.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    for problem in &report.inconsistencies {
        out.push_str(&format!("warning: {problem}\n"));
    }
    out
}
