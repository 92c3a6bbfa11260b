use std::path::Path;

use chatnote_core::config::AppConfig;
use chatnote_core::watch::FolderWatcher;

use crate::commands::common::{build_engine, format_report_lines};
use crate::error::CliError;

pub async fn run_watch(path: Option<&Path>, dry_run: bool, config: &AppConfig) -> Result<(), CliError> {
    let root = path.unwrap_or(config.watch_path.as_path()).to_path_buf();
    let engine = build_engine(config, dry_run).await?;

    println!("Watching {} (Ctrl-C to stop)", root.display());
    let watcher = FolderWatcher::new(root, config.file_filter(), engine);
    let report = watcher
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {error}");
            }
        })
        .await?;

    for line in format_report_lines(&report, dry_run) {
        println!("{line}");
    }
    Ok(())
}
