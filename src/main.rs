//! smig - CLI entry point

mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use smig::cli::{Cli, Commands};

use commands::Settings;

/// Environment variable holding a log filter; overrides `--log-level`.
const LOG_ENV: &str = "SMIG_LOG";

#[cfg(not(tarpaulin_include))]
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = Settings::load(&cli)?;

    match &cli.command {
        Commands::Init => commands::init::handle(&settings, &cli.config),
        Commands::Up(args) => commands::up::handle(&settings, args),
        Commands::Down(args) => commands::down::handle(&settings, args),
        Commands::Status => commands::status::handle(&settings),
        Commands::Version => commands::version::handle(&settings),
        Commands::Check { expect } => commands::check::handle(&settings, expect.as_deref()),
        Commands::Resolve { verdict } => commands::resolve::handle(&settings, *verdict),
    }
}
