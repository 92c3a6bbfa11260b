//! Inbound sync events

use serde::{Deserialize, Serialize};

/// A unit of work for the sync engine: one conversation observed at one moment.
///
/// Event sources may deliver the same event more than once and do not order
/// deliveries across different paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// File path, or a virtual source URI for conversations that do not live in
    /// their own file (`chatgpt-export://<id>`, `chatgpt-web://<id>`)
    pub source_path: String,
    /// Modification time in Unix seconds
    pub mtime: f64,
    /// Stable logical identity of the conversation
    pub identity_key: String,
    /// Note title to write
    pub title: String,
    /// Extracted conversation text
    pub text: String,
}

impl SyncEvent {
    pub fn new(
        source_path: impl Into<String>,
        mtime: f64,
        identity_key: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            mtime,
            identity_key: identity_key.into(),
            title: title.into(),
            text: text.into(),
        }
    }
}
