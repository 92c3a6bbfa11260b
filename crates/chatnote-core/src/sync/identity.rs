//! Identity resolver over an [`IdentityLedger`]

use std::sync::Arc;

use super::ledger::IdentityLedger;
use crate::models::IdentityMapping;

/// Routes a conversation identity to the remote note that represents it.
///
/// Lookups degrade to `None` when the store cannot be read; the caller then
/// creates a new note, which is the fail-open choice for routing.
#[derive(Clone)]
pub struct IdentityResolver {
    ledger: Arc<dyn IdentityLedger>,
}

impl IdentityResolver {
    pub fn new(ledger: Arc<dyn IdentityLedger>) -> Self {
        Self { ledger }
    }

    pub async fn lookup(&self, identity_key: &str) -> Option<String> {
        match self.ledger.lookup(identity_key).await {
            Ok(note_id) => note_id,
            Err(error) => {
                tracing::error!(identity = identity_key, "Identity lookup failed: {error}");
                None
            }
        }
    }

    pub async fn get(&self, identity_key: &str) -> Option<IdentityMapping> {
        match self.ledger.get(identity_key).await {
            Ok(mapping) => mapping,
            Err(error) => {
                tracing::error!(identity = identity_key, "Identity lookup failed: {error}");
                None
            }
        }
    }

    /// Create or overwrite the mapping; `false` when it could not be persisted
    pub async fn upsert(&self, identity_key: &str, remote_note_id: &str) -> bool {
        match self.ledger.upsert(identity_key, remote_note_id).await {
            Ok(()) => {
                tracing::debug!(
                    identity = identity_key,
                    note_id = remote_note_id,
                    "Saved identity mapping"
                );
                true
            }
            Err(error) => {
                tracing::error!(
                    identity = identity_key,
                    note_id = remote_note_id,
                    "Failed to save identity mapping: {error}"
                );
                false
            }
        }
    }

    pub async fn count(&self) -> u64 {
        self.ledger.count().await.unwrap_or_else(|error| {
            tracing::error!("Failed to count identity mappings: {error}");
            0
        })
    }
}
