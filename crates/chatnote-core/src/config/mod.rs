//! Runtime configuration shared by the CLI and the HTTP companion.
//!
//! Everything is read from the environment (after `.env` has been loaded by
//! the binary). Secrets are redacted from `Debug` output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::sync::{ReadFailurePolicy, SyncEngineConfig};
use crate::util::is_http_url;
use crate::watch::{FileFilter, DEFAULT_IGNORE_FILENAMES, DEFAULT_IGNORE_PATHS};

const DEFAULT_EXTENSIONS: &str = ".html,.json,.txt,.zip";
const DEFAULT_NOTEBOOK: &str = "ChatGPT Logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where and how notes are written
#[derive(Clone, PartialEq, Eq)]
pub struct NotesApiConfig {
    pub base_url: String,
    pub token: String,
    pub notebook: String,
}

impl fmt::Debug for NotesApiConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NotesApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("notebook", &self.notebook)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub watch_path: PathBuf,
    pub watch_extensions: Vec<String>,
    pub watch_debounce: Duration,
    pub ignore_paths: Vec<String>,
    pub ignore_filenames: Vec<String>,
    pub db_path: PathBuf,
    /// `None` when no notes service is configured (dry runs only)
    pub notes: Option<NotesApiConfig>,
    pub read_failure_policy: ReadFailurePolicy,
    pub remote_timeout: Duration,
    pub max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let watch_path = optional_trimmed(&lookup, "CHATGPT_DATA_PATH")
            .map_or_else(default_watch_path, PathBuf::from);

        let watch_extensions =
            split_list(&value_or_default(&lookup, "WATCH_EXTENSIONS", DEFAULT_EXTENSIONS));
        if watch_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "WATCH_EXTENSIONS must list at least one extension".to_string(),
            ));
        }

        let debounce_ms = value_or_default(&lookup, "WATCH_DEBOUNCE_MS", "2000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "WATCH_DEBOUNCE_MS must be an integer in [0, 60000]".to_string(),
                )
            })?;
        if debounce_ms > 60_000 {
            return Err(ConfigError::Invalid(
                "WATCH_DEBOUNCE_MS must be in [0, 60000]".to_string(),
            ));
        }

        let mut ignore_paths: Vec<String> =
            DEFAULT_IGNORE_PATHS.iter().map(ToString::to_string).collect();
        ignore_paths.extend(split_list(&value_or_default(&lookup, "IGNORE_PATHS", "")));

        let mut ignore_filenames: Vec<String> = DEFAULT_IGNORE_FILENAMES
            .iter()
            .map(ToString::to_string)
            .collect();
        ignore_filenames.extend(split_list(&value_or_default(&lookup, "IGNORE_FILENAMES", "")));

        let db_path = optional_trimmed(&lookup, "SYNC_DB_PATH")
            .map_or_else(default_db_path, PathBuf::from);

        let notes = parse_notes_config(&lookup)?;

        let read_failure_policy = value_or_default(&lookup, "SYNC_READ_FAILURE_POLICY", "fail-open")
            .parse::<ReadFailurePolicy>()
            .map_err(|error| ConfigError::Invalid(format!("SYNC_READ_FAILURE_POLICY: {error}")))?;

        let remote_timeout_secs = value_or_default(&lookup, "SYNC_REMOTE_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "SYNC_REMOTE_TIMEOUT_SECS must be an integer in [1, 600]".to_string(),
                )
            })?;
        if !(1..=600).contains(&remote_timeout_secs) {
            return Err(ConfigError::Invalid(
                "SYNC_REMOTE_TIMEOUT_SECS must be in [1, 600]".to_string(),
            ));
        }

        let max_attempts = value_or_default(&lookup, "SYNC_MAX_ATTEMPTS", "3")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::Invalid("SYNC_MAX_ATTEMPTS must be an integer in [1, 10]".to_string())
            })?;
        if !(1..=10).contains(&max_attempts) {
            return Err(ConfigError::Invalid(
                "SYNC_MAX_ATTEMPTS must be in [1, 10]".to_string(),
            ));
        }

        Ok(Self {
            watch_path,
            watch_extensions,
            watch_debounce: Duration::from_millis(debounce_ms),
            ignore_paths,
            ignore_filenames,
            db_path,
            notes,
            read_failure_policy,
            remote_timeout: Duration::from_secs(remote_timeout_secs),
            max_attempts,
        })
    }

    pub fn file_filter(&self) -> FileFilter {
        FileFilter::new(
            &self.watch_extensions,
            &self.ignore_paths,
            &self.ignore_filenames,
            self.watch_debounce,
        )
    }

    pub fn engine_config(&self) -> SyncEngineConfig {
        SyncEngineConfig {
            read_failure_policy: self.read_failure_policy,
            remote_timeout: self.remote_timeout,
            max_attempts: self.max_attempts,
            ..SyncEngineConfig::default()
        }
    }
}

fn parse_notes_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<NotesApiConfig>, ConfigError> {
    let Some(base_url) = optional_trimmed(&lookup, "NOTES_API_URL") else {
        return Ok(None);
    };
    if !is_http_url(&base_url) {
        return Err(ConfigError::Invalid(
            "NOTES_API_URL must start with http:// or https://".to_string(),
        ));
    }

    let token = required_trimmed(&lookup, "NOTES_API_TOKEN")?;
    let notebook = value_or_default(&lookup, "NOTES_NOTEBOOK", DEFAULT_NOTEBOOK);

    Ok(Some(NotesApiConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        token,
        notebook,
    }))
}

fn default_watch_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join("ChatGPT_Exports")
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatnote")
        .join("sync_history.db")
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    crate::util::normalize_text_option(lookup(name))
}
