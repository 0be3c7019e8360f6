use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use docattr_core::CoreError;
use docattr_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::Core(CoreError::Store(e))
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Core(CoreError::Doc(_)) => StatusCode::BAD_REQUEST,
            Self::Core(CoreError::Store(
                StoreError::InvalidDocId { .. } | StoreError::InvalidKey { .. },
            )) => StatusCode::BAD_REQUEST,
            Self::Core(CoreError::VersionNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::Store(StoreError::NotFound(_))) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::Overloaded(_) => "overloaded",
            Self::Core(CoreError::Doc(_)) => "malformed_document",
            Self::Core(CoreError::VersionNotFound { .. }) => "not_found",
            Self::Core(CoreError::Store(StoreError::NotFound(_))) => "not_found",
            Self::Core(CoreError::Store(
                StoreError::InvalidDocId { .. } | StoreError::InvalidKey { .. },
            )) => "invalid_request",
            Self::Core(CoreError::Store(_)) => "store_unavailable",
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "status": status.as_u16(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
