//! Sync history repository
//!
//! One row per synchronized `(source_path, mtime)` pair, keyed by fingerprint.

use crate::error::Result;
use crate::models::SyncRecord;
use libsql::{Connection, Value};

/// libSQL access to the `sync_history` table
pub struct SyncHistoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SyncHistoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether a record with this fingerprint exists
    pub async fn contains(&self, fingerprint: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sync_history WHERE fingerprint = ?)",
                [fingerprint],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    /// Fetch a record by fingerprint
    pub async fn get(&self, fingerprint: &str) -> Result<Option<SyncRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT fingerprint, source_path, observed_mtime, remote_note_id, synced_at
                 FROM sync_history WHERE fingerprint = ?",
                [fingerprint],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a record, or overwrite the note id and sync time of an existing one
    pub async fn upsert(&self, record: &SyncRecord) -> Result<()> {
        let remote_note_id = record
            .remote_note_id
            .clone()
            .map_or(Value::Null, Value::Text);

        self.conn
            .execute(
                "INSERT INTO sync_history (fingerprint, source_path, observed_mtime, remote_note_id, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                     remote_note_id = excluded.remote_note_id,
                     synced_at = excluded.synced_at",
                libsql::params![
                    record.fingerprint.as_str(),
                    record.source_path.as_str(),
                    record.observed_mtime,
                    remote_note_id,
                    record.synced_at,
                ],
            )
            .await?;
        Ok(())
    }

    /// Number of distinct fingerprints recorded
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_history", ())
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Delete every record, returning how many were removed
    pub async fn purge(&self) -> Result<u64> {
        Ok(self.conn.execute("DELETE FROM sync_history", ()).await?)
    }

    fn parse_record(row: &libsql::Row) -> Result<SyncRecord> {
        let remote_note_id = match row.get_value(3)? {
            Value::Text(id) => Some(id),
            _ => None,
        };

        Ok(SyncRecord {
            fingerprint: row.get(0)?,
            source_path: row.get(1)?,
            observed_mtime: row.get(2)?,
            remote_note_id,
            synced_at: row.get(4)?,
        })
    }
}
