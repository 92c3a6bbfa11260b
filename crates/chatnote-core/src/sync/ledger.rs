//! Storage capabilities behind the sync protocol.
//!
//! `DedupeLedger` answers "was this exact content-moment already written?" and
//! `IdentityLedger` answers "which remote note represents this conversation?".
//! The two are independent so each can be backed by a different engine.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::models::{IdentityMapping, SyncRecord};
use crate::Result;

/// Append-only log of synchronized `(path, mtime)` fingerprints
#[async_trait]
pub trait DedupeLedger: Send + Sync {
    /// Whether a record with this fingerprint exists
    async fn contains(&self, fingerprint: &str) -> Result<bool>;

    /// Insert a record, overwriting note id and sync time if the fingerprint exists
    async fn record(&self, record: &SyncRecord) -> Result<()>;

    /// Number of distinct fingerprints
    async fn count(&self) -> Result<u64>;

    /// Remove every record, returning how many were removed
    async fn purge(&self) -> Result<u64>;
}

/// Durable identity -> remote note mapping
#[async_trait]
pub trait IdentityLedger: Send + Sync {
    /// Remote note id mapped to an identity
    async fn lookup(&self, identity_key: &str) -> Result<Option<String>>;

    /// Full mapping for an identity
    async fn get(&self, identity_key: &str) -> Result<Option<IdentityMapping>>;

    /// Create or overwrite the mapping for an identity
    async fn upsert(&self, identity_key: &str, remote_note_id: &str) -> Result<()>;

    /// Number of mapped identities
    async fn count(&self) -> Result<u64>;
}

/// Process-local `DedupeLedger`, used for dry runs and tests
#[derive(Default)]
pub struct MemoryDedupeLedger {
    records: Mutex<HashMap<String, SyncRecord>>,
}

impl MemoryDedupeLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupeLedger for MemoryDedupeLedger {
    async fn contains(&self, fingerprint: &str) -> Result<bool> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.contains_key(fingerprint))
    }

    async fn record(&self, record: &SyncRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .entry(record.fingerprint.clone())
            .and_modify(|existing| {
                existing.remote_note_id.clone_from(&record.remote_note_id);
                existing.synced_at = record.synced_at;
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.len() as u64)
    }

    async fn purge(&self) -> Result<u64> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}

/// Process-local `IdentityLedger`, used for dry runs and tests
#[derive(Default)]
pub struct MemoryIdentityLedger {
    mappings: Mutex<HashMap<String, IdentityMapping>>,
}

impl MemoryIdentityLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityLedger for MemoryIdentityLedger {
    async fn lookup(&self, identity_key: &str) -> Result<Option<String>> {
        let mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(mappings
            .get(identity_key)
            .map(|mapping| mapping.remote_note_id.clone()))
    }

    async fn get(&self, identity_key: &str) -> Result<Option<IdentityMapping>> {
        let mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(mappings.get(identity_key).cloned())
    }

    async fn upsert(&self, identity_key: &str, remote_note_id: &str) -> Result<()> {
        let now = crate::util::unix_millis_now();
        let mut mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        mappings
            .entry(identity_key.to_string())
            .and_modify(|mapping| {
                mapping.remote_note_id = remote_note_id.to_string();
                mapping.updated_at = mapping.updated_at.max(now);
            })
            .or_insert_with(|| IdentityMapping::new(identity_key, remote_note_id));
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(mappings.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_dedupe_ledger_overwrites_in_place() {
        let ledger = MemoryDedupeLedger::new();
        let first = SyncRecord::new("/a", 1.0, Some("note-1"));
        let second = SyncRecord::new("/a", 1.0, Some("note-2"));

        ledger.record(&first).await.unwrap();
        ledger.record(&second).await.unwrap();

        assert!(ledger.contains(&first.fingerprint).await.unwrap());
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert_eq!(ledger.purge().await.unwrap(), 1);
        assert_eq!(ledger.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_identity_ledger_keeps_created_at() {
        let ledger = MemoryIdentityLedger::new();
        ledger.upsert("conv-abc", "note-1").await.unwrap();
        let created = ledger.get("conv-abc").await.unwrap().unwrap();

        ledger.upsert("conv-abc", "note-2").await.unwrap();
        let updated = ledger.get("conv-abc").await.unwrap().unwrap();

        assert_eq!(updated.remote_note_id, "note-2");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(ledger.count().await.unwrap(), 1);
    }
}
