//! Chatbot Request and Response Types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of POST /api/chat/send-msg.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageRequest {
    pub message: String,
    pub bot_id: Uuid,
    pub visitor_id: Uuid,
}

/// Chat answer returned to the widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub status_code: u16,
    pub answer: String,
}

/// Returned when the engine answered with something other than JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DegradedChatResponse {
    pub status_code: u16,
    pub error: String,
    pub raw: String,
}

/// Error text attached to a degraded chat response.
pub const INVALID_ENGINE_JSON: &str = "Invalid JSON returned from automation engine";

/// A submission was handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionAccepted {
    pub accepted: bool,
}
