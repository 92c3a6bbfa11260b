//! Change classifier: has this exact content-moment already been synced?

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ledger::DedupeLedger;
use crate::models::{fingerprint_of, SyncRecord};

/// What `is_synced` answers when the store cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadFailurePolicy {
    /// Report "not synced". A storage fault may cause a duplicate remote write,
    /// never a silently dropped update. Callers must tolerate redundant writes.
    #[default]
    FailOpen,
    /// Report "synced". A storage fault skips the event; it is picked up again
    /// on the next observed change once the store recovers.
    FailClosed,
}

impl ReadFailurePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailOpen => "fail-open",
            Self::FailClosed => "fail-closed",
        }
    }

    const fn assumed_synced(self) -> bool {
        matches!(self, Self::FailClosed)
    }
}

impl fmt::Display for ReadFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!(
                "unknown read failure policy '{other}' (expected fail-open or fail-closed)"
            )),
        }
    }
}

/// Decides whether a `(path, mtime)` pair still needs a remote write.
///
/// Read errors never propagate: they resolve through the configured
/// [`ReadFailurePolicy`]. Write errors are reported as `false`.
#[derive(Clone)]
pub struct ChangeClassifier {
    ledger: Arc<dyn DedupeLedger>,
    policy: ReadFailurePolicy,
}

impl ChangeClassifier {
    pub fn new(ledger: Arc<dyn DedupeLedger>, policy: ReadFailurePolicy) -> Self {
        Self { ledger, policy }
    }

    pub const fn policy(&self) -> ReadFailurePolicy {
        self.policy
    }

    /// Deterministic fingerprint of a `(path, mtime)` pair
    pub fn fingerprint_of(path: &str, mtime: f64) -> String {
        fingerprint_of(path, mtime)
    }

    /// Whether this exact content-moment was already synced
    pub async fn is_synced(&self, path: &str, mtime: f64) -> bool {
        let fingerprint = fingerprint_of(path, mtime);
        match self.ledger.contains(&fingerprint).await {
            Ok(found) => found,
            Err(error) => {
                let assumed = self.policy.assumed_synced();
                tracing::error!(
                    path,
                    mtime,
                    policy = %self.policy,
                    assumed_synced = assumed,
                    "Duplicate check failed: {error}"
                );
                assumed
            }
        }
    }

    /// Record a content-moment as synced to `remote_note_id`.
    ///
    /// Re-recording the same pair overwrites the note id and sync time.
    pub async fn record_synced(
        &self,
        path: &str,
        mtime: f64,
        remote_note_id: Option<&str>,
    ) -> bool {
        let record = SyncRecord::new(path, mtime, remote_note_id);
        match self.ledger.record(&record).await {
            Ok(()) => {
                tracing::debug!(path, mtime, "Recorded sync history");
                true
            }
            Err(error) => {
                tracing::error!(path, mtime, "Failed to record sync history: {error}");
                false
            }
        }
    }

    /// Total distinct fingerprints recorded (0 when the store cannot be read)
    pub async fn count(&self) -> u64 {
        self.ledger.count().await.unwrap_or_else(|error| {
            tracing::error!("Failed to count sync history: {error}");
            0
        })
    }

    /// Clear all sync history. Identity mappings are untouched.
    pub async fn purge(&self) -> bool {
        match self.ledger.purge().await {
            Ok(removed) => {
                tracing::info!(removed, "Cleared sync history");
                true
            }
            Err(error) => {
                tracing::error!("Failed to clear sync history: {error}");
                false
            }
        }
    }
}
