use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::{sync_folder, sync_path, FileFilter};
use crate::sync::{SyncEngine, SyncReport};
use crate::Result;

/// Time given to writers to finish before a changed file is read
const SETTLE_DELAY: Duration = Duration::from_millis(500);
const EVENT_BUFFER: usize = 256;

/// Watches a folder recursively and syncs every accepted change.
pub struct FolderWatcher {
    root: PathBuf,
    filter: Arc<FileFilter>,
    engine: SyncEngine,
    settle: Duration,
}

impl FolderWatcher {
    pub fn new(root: impl Into<PathBuf>, filter: FileFilter, engine: SyncEngine) -> Self {
        Self {
            root: root.into(),
            filter: Arc::new(filter),
            engine,
            settle: SETTLE_DELAY,
        }
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sweep the folder once, then follow changes until `shutdown` resolves.
    ///
    /// Failures on individual files are logged; only watcher setup errors
    /// end the loop early.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SyncReport> {
        std::fs::create_dir_all(&self.root)?;

        let (tx, mut rx) = mpsc::channel::<PathBuf>(EVENT_BUFFER);
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
                    for path in event.paths {
                        if tx.blocking_send(path).is_err() {
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(error) => tracing::warn!("Watch error: {error}"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        tracing::info!(root = %self.root.display(), "Watching folder");

        let mut report = sync_folder(&self.engine, &self.root, &self.filter).await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Folder watcher stopping");
                    break;
                }
                received = rx.recv() => {
                    let Some(path) = received else {
                        tracing::warn!("Watch channel closed");
                        break;
                    };
                    if !self.filter.should_process(&path) {
                        continue;
                    }
                    tracing::info!(path = %path.display(), "Change detected");
                    let work = async {
                        tokio::time::sleep(self.settle).await;
                        sync_path(&self.engine, &path).await
                    };
                    tokio::select! {
                        () = &mut shutdown => {
                            tracing::info!(path = %path.display(), "Folder watcher stopping mid-sync");
                            break;
                        }
                        file_report = work => report.merge(file_report),
                    }
                }
            }
        }

        drop(watcher);
        Ok(report)
    }
}
