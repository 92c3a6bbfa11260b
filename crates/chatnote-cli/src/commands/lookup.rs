use std::path::Path;

use chatnote_core::models::IdentityMapping;
use chatnote_core::sync::IdentityLedger;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_store};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MappingItem {
    pub identity_key: String,
    pub remote_note_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub updated_at_iso: String,
}

/// Trim the key, and canonicalize it when it names an existing file so it
/// matches the key extraction recorded.
pub fn resolve_identity_key(identity: &str) -> Result<String, CliError> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(CliError::EmptyIdentity);
    }

    let path = Path::new(identity);
    if path.exists() {
        if let Ok(canonical) = path.canonicalize() {
            return Ok(canonical.to_string_lossy().into_owned());
        }
    }
    Ok(identity.to_string())
}

pub async fn find_mapping(identity: &str, db_path: &Path) -> Result<IdentityMapping, CliError> {
    let key = resolve_identity_key(identity)?;
    let store = open_store(db_path).await?;
    let mapping = IdentityLedger::get(&store, &key).await?;
    store.close().await;

    mapping.ok_or(CliError::MappingNotFound(key))
}

pub fn mapping_to_item(mapping: &IdentityMapping) -> MappingItem {
    MappingItem {
        identity_key: mapping.identity_key.clone(),
        remote_note_id: mapping.remote_note_id.clone(),
        created_at: mapping.created_at,
        updated_at: mapping.updated_at,
        updated_at_iso: format_timestamp(mapping.updated_at),
    }
}

pub async fn run_lookup(identity: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let mapping = find_mapping(identity, db_path).await?;
    let item = mapping_to_item(&mapping);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("{} -> {}", item.identity_key, item.remote_note_id);
        println!("Last written: {}", item.updated_at_iso);
    }
    Ok(())
}
