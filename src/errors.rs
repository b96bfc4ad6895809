//! Error types for the title index, query builders and HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// The graph-query endpoint could not produce a usable answer.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("backend returned a malformed result set: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

/// A query builder was handed parameters it cannot render.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid parameter: {param} - {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
}

impl QueryError {
    pub fn invalid(param: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidParameter {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("title index has not been loaded")]
    NotLoaded,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Handler-level error, rendered as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Query(_) => StatusCode::BAD_REQUEST,
            ApiError::Index(IndexError::NotLoaded) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Index(IndexError::Backend(_)) | ApiError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Query(e) => {
                tracing::debug!("rejected request: {}", e);
                e.to_string()
            }
            ApiError::Index(IndexError::NotLoaded) => {
                tracing::warn!("title search while index unloaded");
                "Title index unavailable".to_string()
            }
            ApiError::Index(IndexError::Backend(e)) | ApiError::Backend(e) => {
                tracing::error!("backend error: {}", e);
                "Failed to execute SPARQL query".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
