//! Best-effort text extraction from ChatGPT export artifacts.
//!
//! Plain files become one document keyed by their canonical path. Export
//! archives and `conversations.json` files become one document per
//! conversation, keyed by conversation id.

mod export;
mod html;

use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

pub use export::{
    extract_archive, format_transcript, is_conversation_list, parse_conversations, ChatMessage,
    Conversation,
};
pub use html::html_to_text;

use crate::models::SyncEvent;
use crate::Result;

/// Documents with less trimmed text than this are not worth a note
pub const MIN_TEXT_CHARS: usize = 10;

/// Text pulled out of one artifact, ready to become a [`SyncEvent`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub identity_key: String,
    pub source_path: String,
    pub mtime: f64,
    pub title: String,
    pub text: String,
}

impl ExtractedDocument {
    pub fn has_content(&self) -> bool {
        self.text.trim().chars().count() >= MIN_TEXT_CHARS
    }

    pub fn into_event(self) -> SyncEvent {
        SyncEvent::new(
            self.source_path,
            self.mtime,
            self.identity_key,
            self.title,
            self.text,
        )
    }
}

/// Modification time of a file in Unix seconds
pub fn file_mtime(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default())
}

/// Note title for a plain file
pub fn title_for_file(path: &Path) -> String {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    format!("ChatGPT Log - {name}")
}

/// Extract every document an artifact holds, dropping near-empty ones.
pub fn extract_path(path: &Path) -> Result<Vec<ExtractedDocument>> {
    let canonical = path.canonicalize()?;
    let mtime = file_mtime(&canonical)?;
    let extension = canonical
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let documents = match extension.as_str() {
        "zip" => extract_archive(&canonical, mtime)?,
        "json" => extract_json(&canonical, mtime)?,
        "html" | "htm" => {
            let html = read_lossy(&canonical)?;
            vec![plain_document(&canonical, mtime, html_to_text(&html))]
        }
        _ => vec![plain_document(&canonical, mtime, read_lossy(&canonical)?)],
    };

    let total = documents.len();
    let documents: Vec<ExtractedDocument> = documents
        .into_iter()
        .filter(ExtractedDocument::has_content)
        .collect();
    if documents.len() < total {
        tracing::debug!(
            path = %canonical.display(),
            dropped = total - documents.len(),
            "Dropped near-empty documents"
        );
    }
    Ok(documents)
}

fn extract_json(path: &Path, mtime: f64) -> Result<Vec<ExtractedDocument>> {
    let value: serde_json::Value = serde_json::from_str(&read_lossy(path)?)?;

    if is_conversation_list(&value) {
        return Ok(parse_conversations(value)?
            .into_iter()
            .map(|conversation| conversation.into_document(mtime))
            .collect());
    }

    let text = serde_json::to_string_pretty(&value)?;
    Ok(vec![plain_document(path, mtime, text)])
}

fn plain_document(path: &Path, mtime: f64, text: String) -> ExtractedDocument {
    let key = path.to_string_lossy().into_owned();
    ExtractedDocument {
        identity_key: key.clone(),
        source_path: key,
        mtime,
        title: title_for_file(path),
        text,
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
