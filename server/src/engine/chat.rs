//! Chat Relay
//!
//! Forwards a visitor message to the engine and waits for the reply. The
//! engine usually answers with a JSON array whose first element carries an
//! `output` field; anything else degrades gracefully instead of failing.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::classify_transport_error;
use crate::config::EngineConfig;
use crate::error::{RelayError, RelayResult};

/// Answer used when the engine reply carries no usable `output`.
pub const NO_MESSAGE_FOUND: &str = "No message found";

/// Shape of an engine reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineReply {
    /// A JSON array, normally of objects with an `output` field.
    Sequence(Vec<Value>),
    /// A single JSON object.
    Object(Map<String, Value>),
    /// Any other JSON value (string, number, bool, null).
    Scalar(Value),
    /// Not JSON at all; keeps the raw text.
    Malformed(String),
}

impl EngineReply {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Self::Sequence(items),
            Ok(Value::Object(map)) => Self::Object(map),
            Ok(other) => Self::Scalar(other),
            Err(_) => Self::Malformed(raw.to_string()),
        }
    }

    /// The `output` text of the first sequence element, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Sequence(items) => items
                .first()
                .and_then(|first| first.get("output"))
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty()),
            Self::Object(_) | Self::Scalar(_) | Self::Malformed(_) => None,
        }
    }
}

/// Result of a chat relay call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatReply {
    /// The engine produced a usable reply (or the placeholder).
    Answer { status_code: u16, answer: String },
    /// The engine answered 200 with a body that was not JSON.
    Degraded { status_code: u16, raw: String },
}

impl ChatReply {
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Answer { status_code, .. } | Self::Degraded { status_code, .. } => *status_code,
        }
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    bot_id: Uuid,
}

/// Synchronous request/response relay to the engine's chat endpoint.
#[derive(Clone)]
pub struct ChatRelay {
    client: reqwest::Client,
    config: Arc<EngineConfig>,
}

impl ChatRelay {
    pub const fn new(client: reqwest::Client, config: Arc<EngineConfig>) -> Self {
        Self { client, config }
    }

    /// Send one message and wait for the engine's answer.
    ///
    /// Only a 200 response counts as an answer; every other status is
    /// reported as `UpstreamRejected`.
    #[instrument(skip(self, message), fields(bot_id = %bot_id, message_len = message.len()))]
    pub async fn send(&self, message: &str, bot_id: Uuid) -> RelayResult<ChatReply> {
        let response = self
            .client
            .post(&self.config.chat_url)
            .timeout(self.config.request_timeout)
            .json(&ChatPayload { message, bot_id })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Chat request to automation engine failed");
                classify_transport_error(&e)
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::upstream_rejected(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let reply = match EngineReply::parse(&body) {
            EngineReply::Malformed(raw) => {
                warn!(
                    body_len = raw.len(),
                    "Automation engine returned a non-JSON chat reply"
                );
                ChatReply::Degraded {
                    status_code: status.as_u16(),
                    raw,
                }
            }
            parsed => {
                let answer = parsed.output().unwrap_or(NO_MESSAGE_FOUND).to_string();
                debug!(answer_len = answer.len(), "Chat reply received");
                ChatReply::Answer {
                    status_code: status.as_u16(),
                    answer,
                }
            }
        };

        Ok(reply)
    }
}
