//! chatnote CLI - sync ChatGPT exports into a notes service
//!
//! Sweeps or watches an export folder and inspects the local sync store.

mod cli;
mod commands;
mod error;

use chatnote_core::config::AppConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::lookup::run_lookup;
use crate::commands::purge::run_purge;
use crate::commands::scan::run_scan;
use crate::commands::status::run_status;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatnote=info,chatnote_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    match cli.command {
        Commands::Watch { path, dry_run } => run_watch(path.as_deref(), dry_run, &config).await?,
        Commands::Scan {
            path,
            dry_run,
            json,
        } => run_scan(path.as_deref(), dry_run, json, &config).await?,
        Commands::Status { json } => run_status(json, &config.db_path).await?,
        Commands::Lookup { identity, json } => {
            run_lookup(&identity, json, &config.db_path).await?;
        }
        Commands::Purge { yes } => {
            run_purge(yes, &config.db_path).await?;
        }
    }

    Ok(())
}
