use std::path::Path;
use std::sync::Arc;

use chatnote_core::config::AppConfig;
use chatnote_core::services::SyncStore;
use chatnote_core::sink::{HttpNoteSink, MemoryNoteSink, NoteSink};
use chatnote_core::sync::{MemoryDedupeLedger, MemoryIdentityLedger, SyncEngine, SyncReport};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ReportItem {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,
}

pub async fn open_store(db_path: &Path) -> Result<SyncStore, CliError> {
    Ok(SyncStore::open_path(db_path).await?)
}

/// Engine backed by the persistent store and the configured notes service.
///
/// A dry run never touches the store: ledgers and sink live in memory, so
/// the fake note ids it produces cannot leak into real mappings.
pub async fn build_engine(config: &AppConfig, dry_run: bool) -> Result<SyncEngine, CliError> {
    if dry_run {
        tracing::info!("Dry run: writing to an in-memory sink");
        return Ok(dry_run_engine(config));
    }

    let notes = config.notes.as_ref().ok_or(CliError::NotesNotConfigured)?;
    let sink = HttpNoteSink::new(&notes.base_url, &notes.token, &notes.notebook)?;
    if let Err(error) = sink.check_connection().await {
        tracing::warn!(base_url = %sink.base_url(), "Notes service health check failed: {error}");
    }

    let store = open_store(&config.db_path).await?;
    Ok(store_engine(&store, Arc::new(sink), config))
}

pub fn store_engine(store: &SyncStore, sink: Arc<dyn NoteSink>, config: &AppConfig) -> SyncEngine {
    SyncEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        sink,
        config.engine_config(),
    )
}

pub fn dry_run_engine(config: &AppConfig) -> SyncEngine {
    SyncEngine::new(
        Arc::new(MemoryDedupeLedger::new()),
        Arc::new(MemoryIdentityLedger::new()),
        Arc::new(MemoryNoteSink::new()),
        config.engine_config(),
    )
}

pub const fn report_to_item(report: &SyncReport, dry_run: bool) -> ReportItem {
    ReportItem {
        created: report.created,
        updated: report.updated,
        skipped: report.skipped,
        failed: report.failed,
        dry_run,
    }
}

pub fn format_report_lines(report: &SyncReport, dry_run: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(5);
    if dry_run {
        lines.push("Dry run: nothing was written".to_string());
    }
    lines.push(format!("Created: {}", report.created));
    lines.push(format!("Updated: {}", report.updated));
    lines.push(format!("Skipped: {}", report.skipped));
    lines.push(format!("Failed:  {}", report.failed));
    lines
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map_or_else(|| timestamp_ms.to_string(), |time| time.to_rfc3339())
}
