//! Shared sync store used by the watcher, CLI and HTTP companion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{Database, NoteMappingRepository, SyncHistoryRepository};
use crate::models::{IdentityMapping, SyncRecord};
use crate::sync::{DedupeLedger, IdentityLedger};
use crate::{Error, Result};

/// Explicitly opened handle to the sync database.
///
/// Every operation goes through one async mutex around the connection, which
/// is the single serialization point ahead of the store. After [`close`]
/// every operation fails with [`Error::StoreUnavailable`].
///
/// [`close`]: SyncStore::close
#[derive(Clone)]
pub struct SyncStore {
    db: Arc<Mutex<Option<Database>>>,
    db_path: Option<PathBuf>,
}

impl SyncStore {
    /// Open (or create) the store at `db_path`, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::StoreUnavailable(format!("cannot create {}: {error}", parent.display()))
            })?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Sync store at {} is not a database: {error}. Moving it aside and starting fresh.",
                    db_path.display()
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path)
                    .await
                    .map_err(|error| Error::StoreUnavailable(error.to_string()))?
            }
            Err(error) => return Err(Error::StoreUnavailable(error.to_string())),
        };

        tracing::info!("Opened sync store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests and dry runs).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()
            .await
            .map_err(|error| Error::StoreUnavailable(error.to_string()))?;
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            db_path: None,
        })
    }

    /// Close the connection. Clones share the handle and are closed too.
    pub async fn close(&self) {
        let mut db = self.db.lock().await;
        if db.take().is_some() {
            tracing::info!("Closed sync store");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.db.lock().await.is_some()
    }

    /// On-disk location, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn require_open(db: Option<&Database>) -> Result<&Database> {
        db.ok_or_else(|| Error::StoreUnavailable("sync store is closed".to_string()))
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if !db_path.exists() {
            return Ok(());
        }

        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));
        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved unreadable sync store from {} to {}",
            db_path.display(),
            backup_path.display()
        );

        for suffix in ["-wal", "-shm"] {
            let sidecar = db_path.with_file_name(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DedupeLedger for SyncStore {
    async fn contains(&self, fingerprint: &str) -> Result<bool> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        SyncHistoryRepository::new(db.connection())
            .contains(fingerprint)
            .await
    }

    async fn record(&self, record: &SyncRecord) -> Result<()> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        SyncHistoryRepository::new(db.connection())
            .upsert(record)
            .await
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        SyncHistoryRepository::new(db.connection()).count().await
    }

    async fn purge(&self) -> Result<u64> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        SyncHistoryRepository::new(db.connection()).purge().await
    }
}

#[async_trait]
impl IdentityLedger for SyncStore {
    async fn lookup(&self, identity_key: &str) -> Result<Option<String>> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        NoteMappingRepository::new(db.connection())
            .lookup(identity_key)
            .await
    }

    async fn get(&self, identity_key: &str) -> Result<Option<IdentityMapping>> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        NoteMappingRepository::new(db.connection())
            .get(identity_key)
            .await
    }

    async fn upsert(&self, identity_key: &str, remote_note_id: &str) -> Result<()> {
        let now = crate::util::unix_millis_now();
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        NoteMappingRepository::new(db.connection())
            .upsert(identity_key, remote_note_id, now)
            .await
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.db.lock().await;
        let db = Self::require_open(guard.as_ref())?;
        NoteMappingRepository::new(db.connection()).count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn state_survives_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("sync_history.db");

        {
            let store = SyncStore::open_path(&db_path).await.unwrap();
            let record = SyncRecord::new("/export/conv1.json", 1000.0, Some("note-1"));
            DedupeLedger::record(&store, &record).await.unwrap();
            IdentityLedger::upsert(&store, "conv-abc", "note-1").await.unwrap();
            store.close().await;
        }

        let store = SyncStore::open_path(&db_path).await.unwrap();
        let fingerprint = crate::models::fingerprint_of("/export/conv1.json", 1000.0);
        assert!(store.contains(&fingerprint).await.unwrap());
        assert_eq!(
            store.lookup("conv-abc").await.unwrap().as_deref(),
            Some("note-1")
        );
        assert_eq!(store.path(), Some(db_path.as_path()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_store_reports_unavailable() {
        let store = SyncStore::open_in_memory().await.unwrap();
        assert!(store.is_open().await);

        store.close().await;

        assert!(!store.is_open().await);
        assert!(matches!(
            store.contains("abc").await,
            Err(Error::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.lookup("conv-abc").await,
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_is_scoped_to_sync_history() {
        let store = SyncStore::open_in_memory().await.unwrap();
        DedupeLedger::record(&store, &SyncRecord::new("/a", 1.0, Some("note-1")))
            .await
            .unwrap();
        IdentityLedger::upsert(&store, "conv-abc", "note-1").await.unwrap();

        assert_eq!(DedupeLedger::purge(&store).await.unwrap(), 1);
        assert_eq!(DedupeLedger::count(&store).await.unwrap(), 0);
        assert_eq!(IdentityLedger::count(&store).await.unwrap(), 1);
        assert_eq!(
            store.lookup("conv-abc").await.unwrap().as_deref(),
            Some("note-1")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_file_is_moved_aside() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("sync_history.db");
        std::fs::write(&db_path, vec![0x42_u8; 8192]).unwrap();

        let store = SyncStore::open_path(&db_path).await.unwrap();
        assert_eq!(DedupeLedger::count(&store).await.unwrap(), 0);

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("sync_history.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }
}
