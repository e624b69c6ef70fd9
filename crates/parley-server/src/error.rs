use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("A pending chat request already exists for this pair")]
    DuplicateRequest,

    #[error("Chat request not found")]
    RequestNotFound,

    #[error("Chat has not been accepted")]
    ChatNotAccepted,

    #[error("Missing or empty user identity")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Attachment not found: {0}")]
    MediaNotFound(Uuid),

    #[error("Attachment too large: {size} bytes (max {max})")]
    MediaTooLarge { size: usize, max: usize },

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::DuplicateRequest => (StatusCode::CONFLICT, self.to_string()),
            ServerError::RequestNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::ChatNotAccepted => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::MediaNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::MediaTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::MediaStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Media storage error".to_string())
            }
            ServerError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "Record not found".to_string())
            }
            ServerError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
