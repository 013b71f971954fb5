//! API error types and their JSON responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use till_engine::{ProviderReport, ValidationError};

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No eligible provider holds the object.
    #[error("failed to find object")]
    NotFound,

    /// A synchronized write failed on at least one provider.
    #[error("one or more providers failed the synchronized write")]
    Providers(ProviderReport),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Failed to find object." })),
            )
                .into_response(),
            // The per-provider report is the body: callers need to see
            // which provider failed and how.
            Self::Providers(report) => (StatusCode::BAD_GATEWAY, Json(report)).into_response(),
        }
    }
}
