use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] chatnote_core::Error),
    #[error(transparent)]
    Config(#[from] chatnote_core::config::ConfigError),
    #[error(transparent)]
    Remote(#[from] chatnote_core::sink::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Identity key cannot be empty")]
    EmptyIdentity,
    #[error("No note mapped for identity: {0}")]
    MappingNotFound(String),
    #[error("Refusing to purge sync history without --yes")]
    PurgeNotConfirmed,
    #[error("Path does not exist: {0}")]
    MissingPath(String),
    #[error(
        "Notes service is not configured. Set NOTES_API_URL and NOTES_API_TOKEN, or pass --dry-run."
    )]
    NotesNotConfigured,
}
