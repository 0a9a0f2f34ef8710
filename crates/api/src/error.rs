//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::IdParseError;
use thiserror::Error;
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
///
/// Bodies are `{"error": <reason>, "message": <public message>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The request body was not the expected JSON shape.
    #[error("Invalid request payload: {0}")]
    Payload(#[from] JsonRejection),

    #[error("Invalid path: {0}")]
    Path(#[from] PathRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Workflow(err) => match err {
                WorkflowError::InvalidInput(_) | WorkflowError::InsufficientStock { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                WorkflowError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::Payload(_) | ApiError::Path(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Workflow(err) => err.reason(),
            ApiError::Payload(_) | ApiError::Path(_) => "invalid_input",
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Workflow(err) => err.public_message(),
            ApiError::Payload(_) => "Invalid request payload".to_string(),
            ApiError::Path(_) => "Invalid path".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "error": self.reason(),
            "message": self.public_message(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<IdParseError> for ApiError {
    fn from(err: IdParseError) -> Self {
        ApiError::Workflow(err.into())
    }
}
