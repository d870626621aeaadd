//! CLI definitions for smig
//!
//! The clap structure lives in the library so integration tests can parse
//! argument lists without spawning the binary.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::engine::{Target, Verdict};

/// Build clap styles for help output.
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser, Debug)]
#[command(name = "smig")]
#[command(about = "Apply, revert and inspect SQLite schema migrations")]
#[command(long_about = "smig - schema migration manager for SQLite databases.

Migrations are applied in ascending identity order and reverted most recent
first. Applied migrations are recorded in a history store (a JSON file or
tables inside the database) so later runs know what has been done.

QUICK START:
    smig init                  Create the history store
    smig up                    Apply all pending migrations
    smig status                Show applied and pending migrations
    smig down                  Revert the most recent migration")]
#[command(version)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Path to the config file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Database file, overriding `database.path` from the config
    #[arg(long, short, global = true)]
    pub database: Option<PathBuf>,

    /// Log filter used when SMIG_LOG is unset (e.g. info, debug, smig=trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the history store if it does not exist
    Init,

    /// Apply pending migrations
    #[command(long_about = "Apply pending migrations in ascending identity order.

Stops at the first failing migration. Migrations applied before the failure
stay applied and are listed in the error output.

EXAMPLES:
    smig up                    Apply everything pending
    smig up 1                  Apply only the next pending migration
    smig up --to 002_add_index Apply up to and including 002_add_index")]
    Up(StepArgs),

    /// Revert applied migrations
    #[command(long_about = "Revert applied migrations, most recently applied first.

Without arguments, reverts exactly one migration.

EXAMPLES:
    smig down                  Revert the latest migration
    smig down 2                Revert the two latest migrations
    smig down --all            Revert everything
    smig down --to 001_init    Revert until 001_init is the latest applied")]
    Down(DownArgs),

    /// Show every migration and whether it is applied
    Status,

    /// Print the latest applied migration
    Version,

    /// Exit non-zero unless the schema is fully migrated
    Check {
        /// Require this identity to be the latest applied instead of the
        /// newest registered migration
        #[arg(long)]
        expect: Option<String>,
    },

    /// Settle a migration that was interrupted mid-flight
    #[command(long_about = "Settle a migration that was interrupted mid-flight.

If smig stops between running a migration's action and recording it, further
up/down runs refuse to start. Inspect the schema, then tell smig whether the
interrupted migration's changes are present.

EXAMPLES:
    smig resolve applied       The changes are in the schema
    smig resolve reverted      The changes are not in the schema")]
    Resolve {
        #[arg(value_enum)]
        verdict: VerdictArg,
    },
}

/// Arguments for `up`.
#[derive(Args, Debug, Clone, Default)]
pub struct StepArgs {
    /// Maximum number of migrations to apply
    #[arg(conflicts_with = "to")]
    pub steps: Option<usize>,

    /// Stop after this identity
    #[arg(long)]
    pub to: Option<String>,
}

impl StepArgs {
    pub fn target(&self) -> Target {
        match (&self.to, self.steps) {
            (Some(to), _) => Target::To(to.clone()),
            (None, Some(n)) => Target::Count(n),
            (None, None) => Target::All,
        }
    }
}

/// Arguments for `down`.
#[derive(Args, Debug, Clone, Default)]
pub struct DownArgs {
    /// Number of migrations to revert
    #[arg(conflicts_with_all = ["to", "all"])]
    pub steps: Option<usize>,

    /// Revert until this identity is the latest applied
    #[arg(long, conflicts_with = "all")]
    pub to: Option<String>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,
}

impl DownArgs {
    pub fn target(&self) -> Target {
        match (&self.to, self.steps, self.all) {
            (Some(to), _, _) => Target::To(to.clone()),
            (None, _, true) => Target::All,
            (None, Some(n), false) => Target::Count(n),
            (None, None, false) => Target::Count(1),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictArg {
    Applied,
    Reverted,
}

impl From<VerdictArg> for Verdict {
    fn from(arg: VerdictArg) -> Self {
        match arg {
            VerdictArg::Applied => Verdict::Applied,
            VerdictArg::Reverted => Verdict::Reverted,
        }
    }
}
