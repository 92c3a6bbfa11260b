use std::path::Path;

use chatnote_core::sync::{DedupeLedger, IdentityLedger};
use serde::Serialize;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub db_path: String,
    pub synced_records: u64,
    pub mapped_identities: u64,
}

pub async fn load_status(db_path: &Path) -> Result<StatusItem, CliError> {
    let store = open_store(db_path).await?;
    let synced_records = DedupeLedger::count(&store).await?;
    let mapped_identities = IdentityLedger::count(&store).await?;
    store.close().await;

    Ok(StatusItem {
        db_path: db_path.display().to_string(),
        synced_records,
        mapped_identities,
    })
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let status = load_status(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Store:      {}", status.db_path);
        println!("Synced:     {}", status.synced_records);
        println!("Mapped:     {}", status.mapped_identities);
    }
    Ok(())
}
