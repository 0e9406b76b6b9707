//! Callback Handler
//!
//! Receives ingestion completion callbacks from the automation engine.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, instrument, warn};

use crate::api::AppState;
use crate::error::{RelayError, RelayResult};

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-n8n-signature";

/// POST /api/chatbot-status
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what was sent.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn chatbot_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<StatusCode> {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!(security_event = true, "Automation callback without signature header");
        return Err(RelayError::Authentication);
    };

    // Every verified, well-formed callback is acknowledged so the engine
    // does not retry it
    let outcome = state.callbacks.handle(&body, signature).await?;
    debug!(?outcome, "Callback processed");
    Ok(StatusCode::NO_CONTENT)
}
