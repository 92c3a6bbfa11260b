use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{NoteSink, RemoteError};
use crate::util::compact_text;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// REST client for the notes service.
///
/// `POST {base}/notes` creates a note, `PUT {base}/notes/{id}` replaces one.
/// Both answer with `{"id": "..."}`.
#[derive(Clone)]
pub struct HttpNoteSink {
    client: reqwest::Client,
    base_url: String,
    token: String,
    notebook: String,
}

#[derive(Debug, Serialize)]
struct NotePayload<'a> {
    title: &'a str,
    content: &'a str,
    notebook: &'a str,
}

#[derive(Debug, Deserialize)]
struct NoteResponse {
    #[serde(default)]
    id: Option<String>,
}

impl HttpNoteSink {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        notebook: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|error| RemoteError::Rejected(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            notebook: notebook.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service answers. Used at startup to warn early about bad credentials.
    pub async fn check_connection(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|error| RemoteError::Retryable(sanitize(&error)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_status(status.as_u16(), compact_text(&body)))
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        title: &str,
        body: &str,
    ) -> Result<Option<String>, RemoteError> {
        let payload = NotePayload {
            title,
            content: body,
            notebook: &self.notebook,
        };

        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| RemoteError::Retryable(sanitize(&error)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), compact_text(&text)));
        }

        let text = response
            .text()
            .await
            .map_err(|error| RemoteError::Retryable(sanitize(&error)))?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let parsed: NoteResponse = serde_json::from_str(&text).map_err(|error| {
            RemoteError::Rejected(format!("unexpected notes response: {error}"))
        })?;
        Ok(parsed.id.filter(|id| !id.trim().is_empty()))
    }
}

#[async_trait]
impl NoteSink for HttpNoteSink {
    async fn create(&self, title: &str, body: &str) -> Result<String, RemoteError> {
        let request = self.client.post(format!("{}/notes", self.base_url));
        self.send(request, title, body)
            .await?
            .ok_or_else(|| RemoteError::Rejected("notes service returned no note id".to_string()))
    }

    async fn update(
        &self,
        note_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RemoteError> {
        let encoded_note_id = urlencoding::encode(note_id);
        let request = self
            .client
            .put(format!("{}/notes/{}", self.base_url, encoded_note_id));
        Ok(self
            .send(request, title, body)
            .await?
            .unwrap_or_else(|| note_id.to_string()))
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
