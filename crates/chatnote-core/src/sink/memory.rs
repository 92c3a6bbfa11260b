use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{NoteSink, RemoteError};

/// A note held by [`MemoryNoteSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNote {
    pub title: String,
    pub body: String,
    pub revision: u32,
}

/// In-process sink for dry runs. Notes never leave the process.
#[derive(Default)]
pub struct MemoryNoteSink {
    notes: Mutex<HashMap<String, StoredNote>>,
}

impl MemoryNoteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, note_id: &str) -> Option<StoredNote> {
        let notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        notes.get(note_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NoteSink for MemoryNoteSink {
    async fn create(&self, title: &str, body: &str) -> Result<String, RemoteError> {
        let note_id = Uuid::now_v7().to_string();
        let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        notes.insert(
            note_id.clone(),
            StoredNote {
                title: title.to_string(),
                body: body.to_string(),
                revision: 1,
            },
        );
        tracing::info!(note_id = %note_id, title, "Dry run: created note");
        Ok(note_id)
    }

    async fn update(
        &self,
        note_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RemoteError> {
        let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(note) = notes.get_mut(note_id) else {
            return Err(RemoteError::Rejected(format!("note {note_id} not found")));
        };
        note.title = title.to_string();
        note.body = body.to_string();
        note.revision += 1;
        tracing::info!(note_id, title, "Dry run: updated note");
        Ok(note_id.to_string())
    }
}
