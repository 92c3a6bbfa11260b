//! ChatGPT data export parsing (`conversations.json`, optionally zipped).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractedDocument;
use crate::{Error, Result};

const CONVERSATIONS_FILE: &str = "conversations.json";

/// One message of a conversation, in display form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<f64>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            create_time: None,
        }
    }
}

/// A parsed export conversation with messages in chronological order
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub create_time: Option<f64>,
    pub update_time: Option<f64>,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Convert to a document keyed by conversation id.
    ///
    /// The source path is virtual so one archive can hold many conversations,
    /// and the mtime is the conversation's own update time. An unchanged
    /// conversation in a later export therefore fingerprints the same.
    pub fn into_document(self, fallback_mtime: f64) -> ExtractedDocument {
        let text = format_transcript(&self.messages);
        ExtractedDocument {
            source_path: format!("chatgpt-export://{}", self.id),
            mtime: self
                .update_time
                .or(self.create_time)
                .unwrap_or(fallback_mtime),
            identity_key: self.id,
            title: self.title,
            text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConversation {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    create_time: Option<f64>,
    #[serde(default)]
    update_time: Option<f64>,
    #[serde(default)]
    mapping: BTreeMap<String, RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    create_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    role: Option<String>,
}

impl RawConversation {
    fn into_conversation(self) -> Option<Conversation> {
        let id = self
            .id
            .or(self.conversation_id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())?;

        let mut messages: Vec<ChatMessage> = self
            .mapping
            .into_values()
            .filter_map(|node| node.message)
            .filter_map(|message| {
                let content = message.content.map(content_text).unwrap_or_default();
                if content.is_empty() {
                    return None;
                }
                Some(ChatMessage {
                    role: message
                        .author
                        .and_then(|author| author.role)
                        .unwrap_or_else(|| "unknown".to_string()),
                    content,
                    create_time: message.create_time,
                })
            })
            .collect();
        messages.sort_by(|a, b| {
            a.create_time
                .unwrap_or_default()
                .total_cmp(&b.create_time.unwrap_or_default())
        });

        Some(Conversation {
            id,
            title: crate::util::normalize_text_option(self.title)
                .unwrap_or_else(|| "Untitled".to_string()),
            create_time: self.create_time,
            update_time: self.update_time,
            messages,
        })
    }
}

fn content_text(content: serde_json::Value) -> String {
    use serde_json::Value;

    match content {
        Value::Object(mut object) => match object.remove("parts") {
            Some(Value::Array(parts)) => parts
                .into_iter()
                .filter_map(|part| match part {
                    Value::Null => None,
                    Value::String(text) if text.is_empty() => None,
                    Value::String(text) => Some(text),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => match object.remove("text") {
                Some(Value::String(text)) => text,
                _ => String::new(),
            },
        },
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether a JSON document looks like a ChatGPT `conversations.json`
pub fn is_conversation_list(value: &serde_json::Value) -> bool {
    value.as_array().is_some_and(|items| {
        !items.is_empty()
            && items
                .iter()
                .all(|item| item.get("mapping").is_some_and(serde_json::Value::is_object))
    })
}

/// Parse a `conversations.json` payload. Entries without an id are dropped.
pub fn parse_conversations(value: serde_json::Value) -> Result<Vec<Conversation>> {
    let raw: Vec<RawConversation> = serde_json::from_value(value)?;
    let total = raw.len();
    let conversations: Vec<Conversation> = raw
        .into_iter()
        .filter_map(RawConversation::into_conversation)
        .collect();

    if conversations.len() < total {
        tracing::warn!(
            dropped = total - conversations.len(),
            "Skipped export conversations without an id"
        );
    }
    Ok(conversations)
}

/// Role-labelled transcript, one block per message separated by `---`
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let label = if message.role == "user" {
                "User"
            } else {
                "Assistant"
            };
            format!("**{label}:**\n{}\n", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Read every conversation from an official export archive.
pub fn extract_archive(path: &Path, archive_mtime: f64) -> Result<Vec<ExtractedDocument>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;

    let Some(entry_name) = archive
        .file_names()
        .find(|name| {
            Path::new(name)
                .file_name()
                .is_some_and(|file_name| file_name == CONVERSATIONS_FILE)
        })
        .map(ToString::to_string)
    else {
        return Err(Error::InvalidInput(format!(
            "{} has no {CONVERSATIONS_FILE}",
            path.display()
        )));
    };

    let mut payload = String::new();
    archive.by_name(&entry_name)?.read_to_string(&mut payload)?;

    let conversations = parse_conversations(serde_json::from_str(&payload)?)?;
    tracing::info!(
        archive = %path.display(),
        conversations = conversations.len(),
        "Parsed export archive"
    );

    Ok(conversations
        .into_iter()
        .map(|conversation| conversation.into_document(archive_mtime))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn sample_export() -> serde_json::Value {
        json!([
            {
                "id": "conv-abc",
                "title": "Borrow checker questions",
                "create_time": 1_700_000_000.5,
                "update_time": 1_700_000_100.25,
                "mapping": {
                    "b": {
                        "message": {
                            "author": {"role": "assistant"},
                            "content": {"content_type": "text", "parts": ["Use a reference."]},
                            "create_time": 1_700_000_050.0
                        }
                    },
                    "a": {
                        "message": {
                            "author": {"role": "user"},
                            "content": {"content_type": "text", "parts": ["How do I avoid a move?"]},
                            "create_time": 1_700_000_010.0
                        }
                    },
                    "root": {"message": null},
                    "system": {
                        "message": {
                            "author": {"role": "system"},
                            "content": {"content_type": "text", "parts": [""]}
                        }
                    }
                }
            },
            {
                "title": "No id here",
                "mapping": {}
            }
        ])
    }

    #[test]
    fn parses_and_orders_messages() {
        let conversations = parse_conversations(sample_export()).unwrap();

        assert_eq!(conversations.len(), 1);
        let conversation = &conversations[0];
        assert_eq!(conversation.id, "conv-abc");
        assert_eq!(
            conversation
                .messages
                .iter()
                .map(|message| message.role.as_str())
                .collect::<Vec<_>>(),
            vec!["user", "assistant"]
        );
    }

    #[test]
    fn transcript_uses_role_labels() {
        let transcript = format_transcript(&[
            ChatMessage::new("user", "hi"),
            ChatMessage::new("assistant", "hello"),
        ]);
        assert_eq!(
            transcript,
            "**User:**\nhi\n\n---\n\n**Assistant:**\nhello\n"
        );
    }

    #[test]
    fn document_uses_virtual_path_and_update_time() {
        let conversation = parse_conversations(sample_export())
            .unwrap()
            .remove(0);
        let document = conversation.into_document(42.0);

        assert_eq!(document.source_path, "chatgpt-export://conv-abc");
        assert_eq!(document.identity_key, "conv-abc");
        assert!((document.mtime - 1_700_000_100.25).abs() < f64::EPSILON);
        assert_eq!(document.title, "Borrow checker questions");
        assert!(document.text.contains("How do I avoid a move?"));
    }

    #[test]
    fn detects_conversation_lists() {
        assert!(is_conversation_list(&sample_export()));
        assert!(!is_conversation_list(&json!([{"title": "x"}])));
        assert!(!is_conversation_list(&json!({"mapping": {}})));
        assert!(!is_conversation_list(&json!([])));
    }

    #[test]
    fn extracts_conversations_from_archive() {
        let tmp = tempdir().unwrap();
        let archive_path = tmp.path().join("chatgpt-export.zip");

        let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("export/chat.html", options).unwrap();
        writer.write_all(b"<html></html>").unwrap();
        writer
            .start_file("export/conversations.json", options)
            .unwrap();
        writer
            .write_all(sample_export().to_string().as_bytes())
            .unwrap();
        writer.finish().unwrap();

        let documents = extract_archive(&archive_path, 1.0).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].identity_key, "conv-abc");
    }

    #[test]
    fn archive_without_conversations_is_invalid() {
        let tmp = tempdir().unwrap();
        let archive_path = tmp.path().join("other.zip");

        let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
        writer
            .start_file("readme.txt", zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored))
            .unwrap();
        writer.write_all(b"nothing").unwrap();
        writer.finish().unwrap();

        assert!(matches!(
            extract_archive(&archive_path, 1.0),
            Err(Error::InvalidInput(_))
        ));
    }
}
