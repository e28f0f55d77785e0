//! HTTP mapping for API failures.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use trendpost_core::{PostId, RefineError, SessionId, StepKind, TrendpostError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("SESSION/NOT_FOUND: {0}")]
    SessionNotFound(SessionId),

    #[error("POST/NOT_FOUND: {0}")]
    PostNotFound(PostId),

    #[error("STEP/RESERVED: {0} steps are recorded by the refine route only")]
    ReservedStep(StepKind),

    #[error(transparent)]
    Refine(#[from] RefineError),

    #[error(transparent)]
    Internal(#[from] TrendpostError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) | ApiError::PostNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ReservedStep(_) | ApiError::Refine(RefineError::EmptyRequest) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Refine(RefineError::OracleFailure(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
