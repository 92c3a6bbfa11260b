//! Sync record model and content-moment fingerprints

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One synchronized content-moment: a `(source_path, mtime)` pair that reached
/// the remote notes service.
///
/// Records are append-only from the protocol's point of view. A new mtime for
/// the same path produces a new fingerprint and therefore a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// SHA-256 hex digest of `"{source_path}_{mtime}"`
    pub fingerprint: String,
    /// Path (or virtual source URI) the content came from
    pub source_path: String,
    /// Modification time observed when the event was processed (Unix seconds)
    pub observed_mtime: f64,
    /// Remote note the content was written to
    pub remote_note_id: Option<String>,
    /// When the record was written (Unix ms)
    pub synced_at: i64,
}

impl SyncRecord {
    /// Build a record for a content-moment synced right now
    #[must_use]
    pub fn new(source_path: &str, observed_mtime: f64, remote_note_id: Option<&str>) -> Self {
        Self {
            fingerprint: fingerprint_of(source_path, observed_mtime),
            source_path: source_path.to_string(),
            observed_mtime,
            remote_note_id: remote_note_id.map(ToString::to_string),
            synced_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Deterministic fingerprint of a `(path, mtime)` pair.
///
/// Hashes the UTF-8 bytes of `"{path}_{mtime}"`, with the mtime rendered by
/// [`format_mtime`]. Fingerprints are stable across runs and processes.
#[must_use]
pub fn fingerprint_of(path: &str, mtime: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{path}_{}", format_mtime(mtime)).as_bytes());
    hex::encode(hasher.finalize())
}

/// Render an mtime as the shortest round-trip decimal, keeping a trailing `.0`
/// on integral values (`1000.0`, `1712345678.123456`).
///
/// Stored fingerprints depend on this exact form, so it must not change.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn format_mtime(mtime: f64) -> String {
    if mtime.is_finite() && mtime.fract() == 0.0 && mtime.abs() < 1e16 {
        format!("{mtime:.1}")
    } else {
        mtime.to_string()
    }
}
