use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::parse::ParseError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("LLM request failed: {0}")]
    Gateway(String),

    #[error("Failed to parse AI response: {0}")]
    Parse(#[from] ParseError),

    #[error("History storage error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("History encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Gateway { .. }
            | AppError::Parse { .. }
            | AppError::Persistence { .. }
            | AppError::Encoding { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Parse(parse) => json!({
                "success": false,
                "error": self.to_string(),
                "debug": {
                    "raw": parse.raw,
                    "cleaned": parse.cleaned,
                },
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
