//! Identity mapping model

use serde::{Deserialize, Serialize};

/// Routes a logical conversation to the remote note that represents it.
///
/// There is exactly one mapping per `identity_key`. Re-syncing the same
/// conversation overwrites `remote_note_id` and advances `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    /// Stable logical identity (conversation id or canonical file path)
    pub identity_key: String,
    /// Remote note last written for this identity
    pub remote_note_id: String,
    /// First time the identity was mapped (Unix ms)
    pub created_at: i64,
    /// Last time the mapping was written (Unix ms)
    pub updated_at: i64,
}

impl IdentityMapping {
    /// Create a fresh mapping stamped with the current time
    #[must_use]
    pub fn new(identity_key: impl Into<String>, remote_note_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            identity_key: identity_key.into(),
            remote_note_id: remote_note_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
