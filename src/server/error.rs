//! HTTP error responses

use crate::error::{AuthError, RecipeError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers, rendered as `{"error": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error("Failed to generate token")]
    Token(#[from] AuthError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Recipe(RecipeError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Recipe(RecipeError::Validation { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Token(e) => {
                error!(error = %e, "Failed to generate token");
                json!({ "error": self.to_string(), "details": e.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
