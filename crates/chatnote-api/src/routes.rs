use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatnote_core::extract::{format_transcript, ChatMessage};
use chatnote_core::models::SyncEvent;
use chatnote_core::sync::{SyncEngine, SyncOutcome};
use chatnote_core::util::unix_seconds_now;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    engine: SyncEngine,
}

impl AppState {
    pub const fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(healthz))
        .route("/v1/conversations", post(sync_conversation))
        .route("/api/save", post(sync_conversation))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    synced: u64,
    mapped: u64,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "chatnote-api",
        version: env!("CARGO_PKG_VERSION"),
        synced: state.engine.classifier().count().await,
        mapped: state.engine.identities().count().await,
    })
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

/// Conversation captured from the ChatGPT web app.
///
/// Accepts both snake_case fields and the camelCase ones the browser
/// extension sends.
#[derive(Debug, Deserialize)]
struct ConversationRequest {
    #[serde(default, alias = "conversationId")]
    conversation_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    messages: Vec<MessagePayload>,
    #[serde(default)]
    url: Option<String>,
    /// Unix seconds; the capture time is used when absent
    #[serde(default, alias = "updatedAt")]
    updated_at: Option<f64>,
}

impl ConversationRequest {
    fn into_event(self) -> Result<SyncEvent, AppError> {
        let conversation_id = self.conversation_id.trim().to_string();
        if conversation_id.is_empty() {
            return Err(AppError::bad_request("conversation_id is required"));
        }

        let messages: Vec<ChatMessage> = self
            .messages
            .into_iter()
            .map(|message| ChatMessage::new(message.role, message.content))
            .collect();
        let mut text = format_transcript(&messages);
        let url = self.url.as_deref().map(str::trim).filter(|url| !url.is_empty());
        if let (Some(url), false) = (url, text.trim().is_empty()) {
            text = format!("{text}\n\n---\n\nSource: {url}");
        }

        let title = self
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| format!("ChatGPT Conversation {conversation_id}"));

        Ok(SyncEvent::new(
            format!("chatgpt-web://{conversation_id}"),
            self.updated_at.unwrap_or_else(unix_seconds_now),
            conversation_id,
            title,
            text,
        ))
    }
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    message: String,
    #[serde(flatten)]
    outcome: SyncOutcome,
}

impl SyncResponse {
    fn new(title: &str, outcome: SyncOutcome) -> Json<Self> {
        Json(Self {
            success: true,
            message: format!("{}: {title}", outcome.label()),
            outcome,
        })
    }
}

async fn sync_conversation(
    State(state): State<AppState>,
    Json(request): Json<ConversationRequest>,
) -> Result<(StatusCode, Json<SyncResponse>), AppError> {
    let event = request.into_event()?;
    let outcome = state.engine.sync(&event).await;
    tracing::info!(
        endpoint = "conversations",
        identity = %event.identity_key,
        outcome = outcome.label(),
        note_id = outcome.note_id().unwrap_or("none"),
        "Processed conversation"
    );

    match outcome {
        SyncOutcome::Failed { reason } => Err(reason.into()),
        SyncOutcome::Created { .. } => Ok((
            StatusCode::CREATED,
            SyncResponse::new(&event.title, outcome),
        )),
        SyncOutcome::Updated { .. } | SyncOutcome::Skipped { .. } => {
            Ok((StatusCode::OK, SyncResponse::new(&event.title, outcome)))
        }
    }
}
