use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use playground_store::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("playground {0} not found")]
    PlaygroundNotFound(String),
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("session {0} has no instance")]
    NoInstance(String),
    #[error("session {session_id} has {count} instances, expected exactly one")]
    AmbiguousInstance { session_id: String, count: usize },
    #[error(transparent)]
    Store(StoreError),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PlatformError::PlaygroundNotFound(_)
                | PlatformError::SessionNotFound(_)
                | PlatformError::NoInstance(_)
        )
    }
}

impl From<StoreError> for PlatformError {
    fn from(err: StoreError) -> Self {
        PlatformError::Store(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl PlatformError {
    /// Stable machine-readable code carried in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PlatformError::PlaygroundNotFound(_) => "playground_not_found",
            PlatformError::SessionNotFound(_) => "session_not_found",
            PlatformError::NoInstance(_) => "no_instance",
            PlatformError::AmbiguousInstance { .. } => "ambiguous_instance",
            PlatformError::Store(_) => "store_error",
        }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        match &self {
            // Unknown sessions get an empty body.
            PlatformError::SessionNotFound(_) => StatusCode::NOT_FOUND.into_response(),
            PlatformError::Store(err) => {
                tracing::error!(error = %err, "storage failure while serving request");
                let body = ErrorBody {
                    error: self.code(),
                    message: "storage unavailable".into(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            _ => {
                let body = ErrorBody {
                    error: self.code(),
                    message: self.to_string(),
                };
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
        }
    }
}
