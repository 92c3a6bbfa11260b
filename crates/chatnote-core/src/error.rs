//! Error types for chatnote-core

use thiserror::Error;

/// Result type alias using chatnote-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chatnote-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// The sync store could not be opened or has been closed
    #[error("Sync store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Export archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Filesystem watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
