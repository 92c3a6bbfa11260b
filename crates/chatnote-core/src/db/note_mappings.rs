//! Identity -> remote note mapping repository

use crate::error::Result;
use crate::models::IdentityMapping;
use libsql::Connection;

/// libSQL access to the `note_mappings` table
pub struct NoteMappingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NoteMappingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Remote note id currently mapped to an identity
    pub async fn lookup(&self, identity_key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT remote_note_id FROM note_mappings WHERE identity_key = ?",
                [identity_key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /// Full mapping row for an identity
    pub async fn get(&self, identity_key: &str) -> Result<Option<IdentityMapping>> {
        let mut rows = self
            .conn
            .query(
                "SELECT identity_key, remote_note_id, created_at, updated_at
                 FROM note_mappings WHERE identity_key = ?",
                [identity_key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(IdentityMapping {
                identity_key: row.get(0)?,
                remote_note_id: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    /// Create or overwrite the mapping for an identity in a single statement.
    ///
    /// `created_at` is only set on insert; `updated_at` never moves backwards.
    pub async fn upsert(&self, identity_key: &str, remote_note_id: &str, now: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO note_mappings (identity_key, remote_note_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(identity_key) DO UPDATE SET
                     remote_note_id = excluded.remote_note_id,
                     updated_at = MAX(note_mappings.updated_at, excluded.updated_at)",
                libsql::params![identity_key, remote_note_id, now],
            )
            .await?;
        Ok(())
    }

    /// Number of mapped identities
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM note_mappings", ())
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
