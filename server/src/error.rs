//! Relay Error Types
//!
//! Every failure the relay can surface, mapped onto an HTTP status at the
//! handler boundary. Raw transport and database errors never reach callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Longest slice of an upstream body kept for diagnostics.
pub const UPSTREAM_BODY_PREVIEW: usize = 512;

/// Relay error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller input was malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Callback signature did not match.
    #[error("Invalid signature")]
    Authentication,

    /// Request origin is not on the bot's allow-list.
    #[error("Origin not allowed")]
    Forbidden,

    /// No bot with the given id.
    #[error("Bot not found")]
    BotNotFound,

    /// The automation engine could not be reached.
    #[error("Automation engine is unreachable")]
    UpstreamUnavailable,

    /// The automation engine did not answer before the deadline.
    #[error("Automation engine request timed out")]
    UpstreamTimeout,

    /// The automation engine answered with a non-success status.
    #[error("Automation engine error: {status}")]
    UpstreamRejected {
        /// Upstream HTTP status code.
        status: u16,
        /// Truncated upstream response body.
        body: String,
    },

    /// Any other transport fault while talking to the engine.
    #[error("Unexpected error while contacting the automation engine")]
    UpstreamUnexpected(String),

    /// Callback body did not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Callback carried an event type this relay does not handle.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Settings cache error.
    #[error("Cache error")]
    Cache(String),
}

impl RelayError {
    /// Build an `UpstreamRejected` error, keeping only a preview of the body.
    pub fn upstream_rejected(status: u16, body: &str) -> Self {
        Self::UpstreamRejected {
            status,
            body: body.chars().take(UPSTREAM_BODY_PREVIEW).collect(),
        }
    }

    /// HTTP status and machine-readable code for this error.
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Authentication => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "ORIGIN_NOT_ALLOWED"),
            Self::BotNotFound => (StatusCode::NOT_FOUND, "BOT_NOT_FOUND"),
            Self::UpstreamUnavailable => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            Self::UpstreamTimeout => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
            Self::UpstreamRejected { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_REJECTED"),
            Self::UpstreamUnexpected(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_UNEXPECTED")
            }
            Self::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "MALFORMED_PAYLOAD"),
            Self::UnknownEventType(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_EVENT_TYPE"),
            Self::Database(_) | Self::Cache(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Status returned by the automation engine, when it rejected the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let upstream_status = match &self {
            Self::UpstreamRejected { status, body } => {
                tracing::warn!(
                    upstream_status = status,
                    upstream_body = %body,
                    "Automation engine rejected request"
                );
                Some(*status)
            }
            Self::UpstreamUnexpected(detail) => {
                tracing::error!(detail = %detail, "Unexpected automation engine failure");
                None
            }
            Self::Database(err) => {
                tracing::error!(error = %err, "Database error in relay");
                None
            }
            Self::Cache(err) => {
                tracing::error!(error = %err, "Cache error in relay");
                None
            }
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
            upstream_status,
        });

        (status, body).into_response()
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
