use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::ingest::IngestError;

#[derive(Debug)]
pub enum AppError {
    Ingest(IngestError),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Ingest(e @ IngestError::Authentication) => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            AppError::Ingest(e @ IngestError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Ingest(IngestError::Unexpected(cause)) => {
                error!(error = %cause, "Failed to process submission");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to process submission".to_owned(),
                )
            }
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}
