//! Remote note sink: where synced conversations end up.

mod http;
mod memory;

pub use http::HttpNoteSink;
pub use memory::MemoryNoteSink;

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a remote create/update call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transient failure (network, timeout, auth refresh, throttling, 5xx)
    #[error("retryable remote failure: {0}")]
    Retryable(String),

    /// Permanent failure; retrying the same request cannot succeed
    #[error("remote rejected the write: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Classify an HTTP status the way the notes service uses them.
    ///
    /// 401/403 are treated as transient because tokens are refreshed out of band.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = format!("HTTP {status}: {}", detail.into());
        match status {
            401 | 403 | 408 | 429 | 500..=599 => Self::Retryable(detail),
            _ => Self::Rejected(detail),
        }
    }
}

/// Remote notes service accepting create and update operations.
///
/// Both calls return the id of the note that now holds the content. `update`
/// may return a different id than the one requested if the service re-keys it.
#[async_trait]
pub trait NoteSink: Send + Sync {
    async fn create(&self, title: &str, body: &str) -> Result<String, RemoteError>;

    async fn update(&self, note_id: &str, title: &str, body: &str)
        -> Result<String, RemoteError>;
}

/// Wrap plain conversation text into an XHTML note body with a metadata header.
pub fn render_note_body(text: &str, source: &str) -> String {
    let captured = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let body = escape_html(text).replace('\n', "<br/>");

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<note>\n",
            "<div class=\"chatnote-meta\">",
            "<strong>Captured:</strong> {captured}<br/>",
            "<strong>Source:</strong> {source}<br/>",
            "</div>\n",
            "<div>{body}</div>\n",
            "</note>"
        ),
        captured = captured,
        source = escape_html(source),
        body = body,
    )
}

/// Escape the five XML special characters
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
