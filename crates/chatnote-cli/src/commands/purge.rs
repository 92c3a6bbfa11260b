use std::path::Path;

use chatnote_core::sync::DedupeLedger;

use crate::commands::common::open_store;
use crate::error::CliError;

/// Clear the dedupe history. Identity mappings are kept so later syncs
/// still update the existing notes instead of creating new ones.
pub async fn run_purge(confirmed: bool, db_path: &Path) -> Result<u64, CliError> {
    if !confirmed {
        return Err(CliError::PurgeNotConfirmed);
    }

    let store = open_store(db_path).await?;
    let removed = DedupeLedger::purge(&store).await?;
    store.close().await;

    tracing::info!(removed, "Purged sync history");
    println!("Cleared {removed} sync records (note mappings kept)");
    Ok(removed)
}
