use std::path::Path;

use chatnote_core::config::AppConfig;
use chatnote_core::sync::{SyncEngine, SyncReport};
use chatnote_core::watch::{sync_folder, sync_path, FileFilter};

use crate::commands::common::{build_engine, format_report_lines, report_to_item};
use crate::error::CliError;

pub async fn run_scan(
    path: Option<&Path>,
    dry_run: bool,
    as_json: bool,
    config: &AppConfig,
) -> Result<(), CliError> {
    let target = path.unwrap_or(config.watch_path.as_path());
    let engine = build_engine(config, dry_run).await?;
    let report = scan_target(&engine, target, &config.file_filter()).await?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report_to_item(&report, dry_run))?
        );
    } else {
        for line in format_report_lines(&report, dry_run) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Sync one file or sweep one folder.
///
/// A single file bypasses the filter's rules so any export can be synced by hand.
pub async fn scan_target(
    engine: &SyncEngine,
    target: &Path,
    filter: &FileFilter,
) -> Result<SyncReport, CliError> {
    if target.is_file() {
        Ok(sync_path(engine, target).await)
    } else if target.is_dir() {
        Ok(sync_folder(engine, target, filter).await)
    } else {
        Err(CliError::MissingPath(target.display().to_string()))
    }
}
