use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatnote_core::sync::FailureReason;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Notes service error: {0}")]
    External(String),
    #[error("Sync state error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<FailureReason> for AppError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::RemoteWriteFailed(detail) => {
                Self::External(format!("write failed after retries: {detail}"))
            }
            FailureReason::RemoteWriteRejected(detail) => {
                Self::External(format!("write rejected: {detail}"))
            }
            FailureReason::LocalStateNotPersisted { note_id } => Self::Internal(format!(
                "note {note_id} was written but could not be recorded locally"
            )),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::External(_) | Self::Internal(_) => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
