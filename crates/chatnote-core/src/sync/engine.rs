//! Sync orchestration: one event in, one outcome out.
//!
//! For each event the engine holds `fp:{fingerprint}` and then
//! `id:{identity_key}` for the whole check-remote-record sequence, so a
//! redelivered event and two edits of the same conversation never race. Local
//! state is written only after the remote call has succeeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::classifier::{ChangeClassifier, ReadFailurePolicy};
use super::identity::IdentityResolver;
use super::ledger::{DedupeLedger, IdentityLedger};
use super::locks::KeyedLocks;
use crate::models::{fingerprint_of, SyncEvent};
use crate::sink::{render_note_body, NoteSink, RemoteError};

/// Tuning for remote calls and the read-failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEngineConfig {
    pub read_failure_policy: ReadFailurePolicy,
    /// Upper bound for a single create/update call
    pub remote_timeout: Duration,
    /// Total attempts for retryable failures, including the first
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            read_failure_policy: ReadFailurePolicy::default(),
            remote_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadySynced,
    EmptyContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Retryable failure that outlived every attempt
    RemoteWriteFailed(String),
    /// Permanent failure reported by the notes service
    RemoteWriteRejected(String),
    /// The note was written remotely but local state could not be saved
    LocalStateNotPersisted { note_id: String },
}

/// Result of processing one [`SyncEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created { note_id: String },
    Updated { note_id: String },
    Skipped { reason: SkipReason },
    Failed { reason: FailureReason },
}

impl SyncOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    /// Remote note the content now lives in, if any was written
    pub fn note_id(&self) -> Option<&str> {
        match self {
            Self::Created { note_id }
            | Self::Updated { note_id }
            | Self::Failed {
                reason: FailureReason::LocalStateNotPersisted { note_id },
            } => Some(note_id.as_str()),
            Self::Skipped { .. } | Self::Failed { .. } => None,
        }
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-outcome tally for batch runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created { .. } => self.created += 1,
            SyncOutcome::Updated { .. } => self.updated += 1,
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub const fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

enum RemoteWrite {
    Create,
    Update(String),
}

/// Shared sync engine. Cheap to clone; clones share locks and storage.
#[derive(Clone)]
pub struct SyncEngine {
    classifier: ChangeClassifier,
    identities: IdentityResolver,
    sink: Arc<dyn NoteSink>,
    locks: KeyedLocks,
    config: SyncEngineConfig,
}

impl SyncEngine {
    pub fn new(
        dedupe: Arc<dyn DedupeLedger>,
        identities: Arc<dyn IdentityLedger>,
        sink: Arc<dyn NoteSink>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            classifier: ChangeClassifier::new(dedupe, config.read_failure_policy),
            identities: IdentityResolver::new(identities),
            sink,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub const fn classifier(&self) -> &ChangeClassifier {
        &self.classifier
    }

    pub const fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    pub async fn sync(&self, event: &SyncEvent) -> SyncOutcome {
        let fingerprint = fingerprint_of(&event.source_path, event.mtime);
        let _fingerprint_guard = self.locks.lock(&format!("fp:{fingerprint}")).await;

        if self
            .classifier
            .is_synced(&event.source_path, event.mtime)
            .await
        {
            tracing::debug!(path = %event.source_path, mtime = event.mtime, "Already synced");
            return SyncOutcome::Skipped {
                reason: SkipReason::AlreadySynced,
            };
        }

        if event.text.trim().is_empty() {
            tracing::debug!(path = %event.source_path, "Skipping empty content");
            return SyncOutcome::Skipped {
                reason: SkipReason::EmptyContent,
            };
        }

        let _identity_guard = self
            .locks
            .lock(&format!("id:{}", event.identity_key))
            .await;

        let write = match self.identities.lookup(&event.identity_key).await {
            Some(note_id) => RemoteWrite::Update(note_id),
            None => RemoteWrite::Create,
        };
        let body = render_note_body(&event.text, &event.source_path);

        let result = match &write {
            RemoteWrite::Create => {
                self.call_remote(event, || self.sink.create(&event.title, &body))
                    .await
            }
            RemoteWrite::Update(note_id) => {
                self.call_remote(event, || self.sink.update(note_id, &event.title, &body))
                    .await
            }
        };

        let note_id = match result {
            Ok(note_id) => note_id,
            Err(RemoteError::Rejected(detail)) => {
                tracing::error!(
                    path = %event.source_path,
                    identity = %event.identity_key,
                    "Notes service rejected the write: {detail}"
                );
                return SyncOutcome::Failed {
                    reason: FailureReason::RemoteWriteRejected(detail),
                };
            }
            Err(RemoteError::Retryable(detail)) => {
                tracing::error!(
                    path = %event.source_path,
                    identity = %event.identity_key,
                    attempts = self.config.max_attempts,
                    "Remote write failed: {detail}"
                );
                return SyncOutcome::Failed {
                    reason: FailureReason::RemoteWriteFailed(detail),
                };
            }
        };

        let persisted = self.identities.upsert(&event.identity_key, &note_id).await
            && self
                .classifier
                .record_synced(&event.source_path, event.mtime, Some(&note_id))
                .await;
        if !persisted {
            return SyncOutcome::Failed {
                reason: FailureReason::LocalStateNotPersisted { note_id },
            };
        }

        match write {
            RemoteWrite::Create => {
                tracing::info!(
                    path = %event.source_path,
                    identity = %event.identity_key,
                    note_id = %note_id,
                    "Created note"
                );
                SyncOutcome::Created { note_id }
            }
            RemoteWrite::Update(_) => {
                tracing::info!(
                    path = %event.source_path,
                    identity = %event.identity_key,
                    note_id = %note_id,
                    "Updated note"
                );
                SyncOutcome::Updated { note_id }
            }
        }
    }

    async fn call_remote<F, Fut>(&self, event: &SyncEvent, mut call: F) -> Result<String, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, RemoteError>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let detail = match tokio::time::timeout(self.config.remote_timeout, call()).await {
                Ok(Ok(note_id)) => return Ok(note_id),
                Ok(Err(RemoteError::Rejected(detail))) => {
                    return Err(RemoteError::Rejected(detail));
                }
                Ok(Err(RemoteError::Retryable(detail))) => detail,
                Err(_) => format!(
                    "timed out after {}s",
                    self.config.remote_timeout.as_secs_f64()
                ),
            };

            if attempt >= attempts {
                return Err(RemoteError::Retryable(detail));
            }

            tracing::warn!(
                path = %event.source_path,
                attempt,
                "Remote write failed, retrying: {detail}"
            );
            tokio::time::sleep(self.config.retry_backoff * attempt).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::services::SyncStore;
    use crate::sync::ledger::{MemoryDedupeLedger, MemoryIdentityLedger};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create { title: String },
        Update { note_id: String, title: String },
    }

    /// Records every call; answers from a script, then with fresh ids
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Call>>,
        script: Mutex<VecDeque<Result<String, RemoteError>>>,
        next_id: AtomicUsize,
        delay: Option<Duration>,
    }

    impl RecordingSink {
        fn scripted(responses: Vec<Result<String, RemoteError>>) -> Self {
            Self {
                script: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn respond(&self, call: Call, default_id: Option<&str>) -> Result<String, RemoteError> {
            self.calls.lock().unwrap().push(call);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(default_id.map_or_else(
                    || format!("note-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
                    ToString::to_string,
                ))
            })
        }
    }

    #[async_trait]
    impl NoteSink for RecordingSink {
        async fn create(&self, title: &str, _body: &str) -> Result<String, RemoteError> {
            self.respond(
                Call::Create {
                    title: title.to_string(),
                },
                None,
            )
            .await
        }

        async fn update(
            &self,
            note_id: &str,
            title: &str,
            _body: &str,
        ) -> Result<String, RemoteError> {
            self.respond(
                Call::Update {
                    note_id: note_id.to_string(),
                    title: title.to_string(),
                },
                Some(note_id),
            )
            .await
        }
    }

    fn fast_config() -> SyncEngineConfig {
        SyncEngineConfig {
            remote_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(1),
            ..SyncEngineConfig::default()
        }
    }

    fn engine_on(store: &SyncStore, sink: Arc<RecordingSink>, config: SyncEngineConfig) -> SyncEngine {
        SyncEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            sink,
            config,
        )
    }

    fn event(mtime: f64, text: &str) -> SyncEvent {
        SyncEvent::new("/export/conv1.json", mtime, "conv-abc", "Conversation", text)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scenario_a_first_sight_creates_and_records() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Created {
                note_id: "note-1".to_string()
            }
        );
        assert_eq!(
            sink.calls(),
            vec![Call::Create {
                title: "Conversation".to_string()
            }]
        );
        assert!(
            engine
                .classifier()
                .is_synced("/export/conv1.json", 1000.0)
                .await
        );
        assert_eq!(
            engine.identities().lookup("conv-abc").await.as_deref(),
            Some("note-1")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scenario_b_new_mtime_updates_existing_note() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        engine.sync(&event(1000.0, "hello")).await;
        let outcome = engine.sync(&event(2000.0, "hello world")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Updated {
                note_id: "note-1".to_string()
            }
        );
        assert_eq!(
            sink.calls().last(),
            Some(&Call::Update {
                note_id: "note-1".to_string(),
                title: "Conversation".to_string()
            })
        );
        assert_eq!(engine.classifier().count().await, 2);
        assert_eq!(engine.identities().count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scenario_c_redelivery_makes_no_remote_call() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        engine.sync(&event(1000.0, "hello")).await;
        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::AlreadySynced
            }
        );
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_text_is_skipped_without_recording() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let outcome = engine.sync(&event(1000.0, "  \n\t ")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::EmptyContent
            }
        );
        assert!(sink.calls().is_empty());
        assert_eq!(engine.classifier().count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_write_records_nothing() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::scripted(vec![Err(RemoteError::Rejected(
            "HTTP 400: bad body".to_string(),
        ))]));
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                reason: FailureReason::RemoteWriteRejected("HTTP 400: bad body".to_string())
            }
        );
        assert_eq!(sink.calls().len(), 1);
        assert_eq!(engine.classifier().count().await, 0);
        assert_eq!(engine.identities().lookup("conv-abc").await, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retryable_write_is_retried_until_success() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::scripted(vec![
            Err(RemoteError::Retryable("HTTP 503: busy".to_string())),
            Err(RemoteError::Retryable("HTTP 429: slow down".to_string())),
        ]));
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(outcome.label(), "created");
        assert_eq!(sink.calls().len(), 3);
        assert!(
            engine
                .classifier()
                .is_synced("/export/conv1.json", 1000.0)
                .await
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_retries_leave_event_unseen() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::scripted(vec![
            Err(RemoteError::Retryable("down".to_string())),
            Err(RemoteError::Retryable("down".to_string())),
            Err(RemoteError::Retryable("down".to_string())),
        ]));
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let outcome = engine.sync(&event(1000.0, "hello")).await;
        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                reason: FailureReason::RemoteWriteFailed("down".to_string())
            }
        );
        assert_eq!(sink.calls().len(), 3);

        // The next delivery of the same event tries again.
        let outcome = engine.sync(&event(1000.0, "hello")).await;
        assert_eq!(outcome.label(), "created");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_remote_counts_as_retryable_timeout() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::slow(Duration::from_millis(200)));
        let config = SyncEngineConfig {
            remote_timeout: Duration::from_millis(20),
            max_attempts: 2,
            ..fast_config()
        };
        let engine = engine_on(&store, Arc::clone(&sink), config);

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert!(matches!(
            outcome,
            SyncOutcome::Failed {
                reason: FailureReason::RemoteWriteFailed(ref detail)
            } if detail.contains("timed out")
        ));
        assert_eq!(sink.calls().len(), 2);
        assert_eq!(engine.classifier().count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_syncs_of_one_identity_create_once() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::slow(Duration::from_millis(20)));
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        let mut tasks = Vec::new();
        for mtime in [1000.0, 2000.0, 3000.0, 1000.0] {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                engine.sync(&event(mtime, "hello world")).await
            }));
        }
        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        let creates = sink
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(sink.calls().len(), 3);
        assert!(outcomes.iter().all(|outcome| !outcome.is_failure()));
        assert_eq!(engine.identities().count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_keeps_mappings_so_resync_updates() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());

        engine.sync(&event(1000.0, "hello")).await;
        assert!(engine.classifier().purge().await);
        assert_eq!(engine.classifier().count().await, 0);
        assert_eq!(
            engine.identities().lookup("conv-abc").await.as_deref(),
            Some("note-1")
        );

        let outcome = engine.sync(&event(1000.0, "hello")).await;
        assert_eq!(
            outcome,
            SyncOutcome::Updated {
                note_id: "note-1".to_string()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_store_fail_open_writes_but_reports_unpersisted() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_on(&store, Arc::clone(&sink), fast_config());
        store.close().await;

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                reason: FailureReason::LocalStateNotPersisted {
                    note_id: "note-1".to_string()
                }
            }
        );
        assert_eq!(outcome.note_id(), Some("note-1"));
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_store_fail_closed_skips_remote_write() {
        let store = SyncStore::open_in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let config = SyncEngineConfig {
            read_failure_policy: ReadFailurePolicy::FailClosed,
            ..fast_config()
        };
        let engine = engine_on(&store, Arc::clone(&sink), config);
        store.close().await;

        let outcome = engine.sync(&event(1000.0, "hello")).await;

        assert_eq!(
            outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::AlreadySynced
            }
        );
        assert!(sink.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_ledgers_drive_the_same_protocol() {
        let sink = Arc::new(RecordingSink::default());
        let engine = SyncEngine::new(
            Arc::new(MemoryDedupeLedger::new()),
            Arc::new(MemoryIdentityLedger::new()),
            Arc::clone(&sink) as Arc<dyn NoteSink>,
            fast_config(),
        );

        assert_eq!(engine.sync(&event(1000.0, "hello")).await.label(), "created");
        assert_eq!(engine.sync(&event(2000.0, "hello!")).await.label(), "updated");
        assert_eq!(engine.sync(&event(2000.0, "hello!")).await.label(), "skipped");
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let created = serde_json::to_value(SyncOutcome::Created {
            note_id: "note-1".to_string(),
        })
        .unwrap();
        assert_eq!(
            created,
            serde_json::json!({"outcome": "created", "note_id": "note-1"})
        );

        let failed = serde_json::to_value(SyncOutcome::Failed {
            reason: FailureReason::RemoteWriteRejected("HTTP 400".to_string()),
        })
        .unwrap();
        assert_eq!(
            failed,
            serde_json::json!({
                "outcome": "failed",
                "reason": {"kind": "remote_write_rejected", "detail": "HTTP 400"}
            })
        );
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = SyncReport::default();
        report.record(&SyncOutcome::Created {
            note_id: "n".to_string(),
        });
        report.record(&SyncOutcome::Skipped {
            reason: SkipReason::AlreadySynced,
        });
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 2);
    }
}
