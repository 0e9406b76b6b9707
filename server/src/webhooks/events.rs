//! Callback Event Types
//!
//! Events the automation engine reports when an ingestion attempt finishes.

use serde::Deserialize;
use uuid::Uuid;

use crate::db::BotStatus;

/// Ingestion completion events sent by the automation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackEventType {
    /// The submitted content was ingested into the knowledge base.
    IngestionCompleted,
    /// Ingestion failed on the engine side.
    IngestionFailed,
}

impl CallbackEventType {
    /// Parse from the wire string (e.g., `"chatbot.ingestion.completed"`).
    ///
    /// The unprefixed `ingestion.*` names are accepted as aliases.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.strip_prefix("chatbot.").unwrap_or(s) {
            "ingestion.completed" => Some(Self::IngestionCompleted),
            "ingestion.failed" => Some(Self::IngestionFailed),
            _ => None,
        }
    }

    /// Convert to the dot-separated string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IngestionCompleted => "chatbot.ingestion.completed",
            Self::IngestionFailed => "chatbot.ingestion.failed",
        }
    }

    /// Bot status this event moves a pending bot into.
    pub const fn target_status(&self) -> BotStatus {
        match self {
            Self::IngestionCompleted => BotStatus::Active,
            Self::IngestionFailed => BotStatus::Failed,
        }
    }
}

impl std::fmt::Display for CallbackEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback body after signature verification.
///
/// Fields are optional so a missing one surfaces as a malformed payload
/// rather than a generic deserialization error.
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    pub bot_id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

impl CallbackPayload {
    /// Bot id as a UUID; engines may send it as a string.
    pub fn bot_id(&self) -> Option<Uuid> {
        self.bot_id
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        for event in [
            CallbackEventType::IngestionCompleted,
            CallbackEventType::IngestionFailed,
        ] {
            assert_eq!(CallbackEventType::parse_str(event.as_str()), Some(event));
        }
        assert_eq!(CallbackEventType::parse_str("chatbot.deleted"), None);
        assert_eq!(CallbackEventType::parse_str("chatbot.ingestion"), None);
    }

    #[test]
    fn unprefixed_names_are_aliases() {
        assert_eq!(
            CallbackEventType::parse_str("ingestion.completed"),
            Some(CallbackEventType::IngestionCompleted)
        );
        assert_eq!(
            CallbackEventType::parse_str("ingestion.failed"),
            Some(CallbackEventType::IngestionFailed)
        );
        assert_eq!(CallbackEventType::parse_str("other.ingestion.failed"), None);
    }

    #[test]
    fn target_statuses() {
        assert_eq!(
            CallbackEventType::IngestionCompleted.target_status(),
            BotStatus::Active
        );
        assert_eq!(
            CallbackEventType::IngestionFailed.target_status(),
            BotStatus::Failed
        );
    }

    #[test]
    fn bot_id_must_be_a_uuid_string() {
        let id = Uuid::new_v4();
        let payload: CallbackPayload =
            serde_json::from_value(serde_json::json!({"bot_id": id.to_string(), "type": "x"}))
                .unwrap();
        assert_eq!(payload.bot_id(), Some(id));

        let payload: CallbackPayload =
            serde_json::from_value(serde_json::json!({"bot_id": 42, "type": "x"})).unwrap();
        assert_eq!(payload.bot_id(), None);
    }
}
