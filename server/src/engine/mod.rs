//! Automation Engine Relays
//!
//! Outbound calls to the workflow-automation engine. Each call carries its own
//! deadline, is attempted exactly once, and has its transport failures
//! translated into [`RelayError`] before returning.

pub mod chat;
pub mod ingestion;

pub use chat::{ChatRelay, ChatReply, EngineReply, NO_MESSAGE_FOUND};
pub use ingestion::{
    IngestionRelay, SourceType, Submission, SubmissionRequest, SubmissionSource, UploadLimits,
    UploadedFile,
};

use crate::error::RelayError;

/// Build the HTTP client shared by the relays.
///
/// Connections are pooled; deadlines are set per request.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("chatbot-relay/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Translate a transport failure into the relay taxonomy.
pub(crate) fn classify_transport_error(err: &reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::UpstreamTimeout
    } else if err.is_connect() {
        RelayError::UpstreamUnavailable
    } else {
        RelayError::UpstreamUnexpected(err.to_string())
    }
}
