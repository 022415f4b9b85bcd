//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl MarketError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

/// JSON body returned for every failed API request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            MarketError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message: message.clone(),
                    field: Some(*field),
                },
            ),
            MarketError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    message: format!("{what} not found"),
                    field: None,
                },
            ),
            MarketError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    message: message.clone(),
                    field: None,
                },
            ),
            other => {
                error!("request failed: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "Internal server error".to_string(),
                        field: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
