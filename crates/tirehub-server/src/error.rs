use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tirehub_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Snapshot storage error: {0}")]
    Storage(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Snapshot storage error".to_string())
            }
            ServerError::Backup(_) | ServerError::Restore(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ServerError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServerError::Store(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
