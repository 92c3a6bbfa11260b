use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Path fragments that never hold conversation content (substring match)
pub const DEFAULT_IGNORE_PATHS: [&str; 9] = [
    "sentry",
    "session.json",
    "GPUCache",
    "Code Cache",
    "Cache",
    "logs",
    "Local Storage",
    "IndexedDB",
    "Session Storage",
];

/// File names that never hold conversation content (exact match)
pub const DEFAULT_IGNORE_FILENAMES: [&str; 4] = ["session.json", "LOCK", "LOG", "MANIFEST"];

/// Decides which changed paths are worth extracting.
pub struct FileFilter {
    extensions: Vec<String>,
    ignore_paths: Vec<String>,
    ignore_filenames: Vec<String>,
    debounce: Duration,
    last_accepted: Mutex<HashMap<PathBuf, Instant>>,
}

impl FileFilter {
    /// Build a filter. Extensions may be given with or without the leading dot.
    pub fn new(
        extensions: &[String],
        ignore_paths: &[String],
        ignore_filenames: &[String],
        debounce: Duration,
    ) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            ignore_paths: ignore_paths.to_vec(),
            ignore_filenames: ignore_filenames.to_vec(),
            debounce,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Extension and ignore rules only; no filesystem access
    pub fn matches(&self, path: &Path) -> bool {
        let Some(extension) = path.extension() else {
            return false;
        };
        let extension = extension.to_string_lossy().to_ascii_lowercase();
        if !self.extensions.contains(&extension) {
            return false;
        }

        let full = path.to_string_lossy();
        if let Some(pattern) = self
            .ignore_paths
            .iter()
            .find(|pattern| full.contains(pattern.as_str()))
        {
            tracing::trace!(path = %full, pattern = %pattern, "Ignored path");
            return false;
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        !self
            .ignore_filenames
            .iter()
            .any(|ignored| ignored.as_str() == file_name)
    }

    /// Rules plus existence plus the per-path debounce window.
    ///
    /// Accepting a path starts its window; events inside it are dropped.
    pub fn should_process(&self, path: &Path) -> bool {
        if !self.matches(path) || !path.is_file() {
            return false;
        }

        let now = Instant::now();
        let mut last_accepted = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = last_accepted.get(path) {
            if now.duration_since(*previous) < self.debounce {
                tracing::debug!(path = %path.display(), "Debounced");
                return false;
            }
        }
        last_accepted.insert(path.to_path_buf(), now);
        true
    }
}
