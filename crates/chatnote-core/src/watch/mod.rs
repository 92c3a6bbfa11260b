//! Folder watching and one-shot sweeps feeding the sync engine.

mod filter;
mod watcher;

use std::path::{Path, PathBuf};

pub use filter::{FileFilter, DEFAULT_IGNORE_FILENAMES, DEFAULT_IGNORE_PATHS};
pub use watcher::FolderWatcher;

use crate::extract::extract_path;
use crate::sync::{SyncEngine, SyncReport};

/// Every file under `root` accepted by the filter's rules, sorted.
///
/// Unreadable directories are logged and skipped.
pub fn scan_folder(root: &Path, filter: &FileFilter) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %dir.display(), "Cannot read directory: {error}");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(kind) if kind.is_file() && filter.matches(&path) => found.push(path),
                _ => {}
            }
        }
    }

    found.sort();
    found
}

/// Extract one file and sync every document in it.
///
/// Extraction failures are logged and reported as an empty tally.
pub async fn sync_path(engine: &SyncEngine, path: &Path) -> SyncReport {
    let mut report = SyncReport::default();

    let owned = path.to_path_buf();
    let documents = match tokio::task::spawn_blocking(move || extract_path(&owned)).await {
        Ok(Ok(documents)) => documents,
        Ok(Err(error)) => {
            tracing::error!(path = %path.display(), "Extraction failed: {error}");
            return report;
        }
        Err(error) => {
            tracing::error!(path = %path.display(), "Extraction task failed: {error}");
            return report;
        }
    };

    for document in documents {
        let outcome = engine.sync(&document.into_event()).await;
        report.record(&outcome);
    }
    report
}

/// Sweep a folder once and sync everything the filter accepts.
pub async fn sync_folder(engine: &SyncEngine, root: &Path, filter: &FileFilter) -> SyncReport {
    let mut report = SyncReport::default();
    let paths = scan_folder(root, filter);
    tracing::info!(root = %root.display(), files = paths.len(), "Sweeping folder");

    for path in paths {
        report.merge(sync_path(engine, &path).await);
    }
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::sink::MemoryNoteSink;
    use crate::sync::{MemoryDedupeLedger, MemoryIdentityLedger, SyncEngineConfig};

    fn text_filter() -> FileFilter {
        FileFilter::new(
            &[".txt".to_string(), ".json".to_string()],
            &["Cache".to_string()],
            &["LOCK".to_string()],
            Duration::ZERO,
        )
    }

    #[test]
    fn scan_walks_subdirectories_and_applies_rules() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested/deeper")).unwrap();
        std::fs::create_dir_all(tmp.path().join("Cache")).unwrap();
        std::fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(tmp.path().join("nested/deeper/b.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("Cache/c.txt"), "cached").unwrap();
        std::fs::write(tmp.path().join("image.png"), "png").unwrap();
        std::fs::write(tmp.path().join("LOCK"), "").unwrap();

        let found = scan_folder(tmp.path(), &text_filter());

        assert_eq!(
            found,
            vec![
                tmp.path().join("a.txt"),
                tmp.path().join("nested/deeper/b.json"),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_sweep_skips_unchanged_files() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("one.txt"), "first conversation body").unwrap();
        std::fs::write(tmp.path().join("two.txt"), "second conversation body").unwrap();

        let sink = Arc::new(MemoryNoteSink::new());
        let engine = SyncEngine::new(
            Arc::new(MemoryDedupeLedger::new()),
            Arc::new(MemoryIdentityLedger::new()),
            sink.clone(),
            SyncEngineConfig::default(),
        );
        let filter = text_filter();

        let first = sync_folder(&engine, tmp.path(), &filter).await;
        let second = sync_folder(&engine, tmp.path(), &filter).await;

        assert_eq!(first.created, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.created + second.updated, 0);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_export_is_logged_not_fatal() {
        let tmp = tempdir().unwrap();
        let broken = tmp.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();

        let engine = SyncEngine::new(
            Arc::new(MemoryDedupeLedger::new()),
            Arc::new(MemoryIdentityLedger::new()),
            Arc::new(MemoryNoteSink::new()),
            SyncEngineConfig::default(),
        );

        let report = sync_path(&engine, &broken).await;
        assert_eq!(report.total(), 0);
    }
}
