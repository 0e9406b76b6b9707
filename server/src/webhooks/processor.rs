//! Callback Processor
//!
//! Authenticates completion callbacks from the automation engine and applies
//! the reported outcome to the bot's status. The body is never parsed before
//! its signature checks out.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::events::{CallbackEventType, CallbackPayload};
use super::signing;
use crate::db::{BotStatus, BotStore, StatusTransition};
use crate::error::{RelayError, RelayResult};

/// How to treat a verified callback whose `type` is not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackPolicy {
    /// Acknowledge and ignore it.
    #[default]
    Lenient,
    /// Reject it with `UnknownEventType`.
    Strict,
}

impl CallbackPolicy {
    pub const fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// What a verified callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The pending bot moved to `status`.
    Applied { bot_id: Uuid, status: BotStatus },
    /// The bot was no longer pending; nothing changed.
    Unchanged { bot_id: Uuid, current: BotStatus },
    /// No such bot; nothing changed.
    UnknownBot { bot_id: Uuid },
    /// Unrecognised event type, ignored under the lenient policy.
    Ignored { event_type: String },
}

/// Verifies and applies ingestion completion callbacks.
#[derive(Clone)]
pub struct CallbackProcessor {
    secret: String,
    store: Arc<dyn BotStore>,
    policy: CallbackPolicy,
}

impl CallbackProcessor {
    pub fn new(
        secret: impl Into<String>,
        store: Arc<dyn BotStore>,
        policy: CallbackPolicy,
    ) -> Self {
        Self {
            secret: secret.into(),
            store,
            policy,
        }
    }

    /// Handle one callback: verify, parse, then update the bot status.
    ///
    /// Any signature failure returns `Authentication` before the body is
    /// looked at, so an unauthenticated request never touches the store.
    #[instrument(skip_all, fields(body_len = raw_body.len()))]
    pub async fn handle(&self, raw_body: &[u8], signature: &str) -> RelayResult<CallbackOutcome> {
        if let Err(err) = signing::verify(raw_body, signature, &self.secret) {
            warn!(
                security_event = true,
                "Rejected automation callback with invalid signature"
            );
            return Err(err);
        }

        let payload: CallbackPayload = serde_json::from_slice(raw_body)
            .map_err(|e| RelayError::MalformedPayload(format!("invalid JSON: {e}")))?;

        let event_type = payload
            .event_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::MalformedPayload("missing type".to_string()))?;

        if payload.bot_id.is_none() {
            return Err(RelayError::MalformedPayload("missing bot_id".to_string()));
        }
        let bot_id = payload
            .bot_id()
            .ok_or_else(|| RelayError::MalformedPayload("bot_id is not a UUID".to_string()))?;

        let Some(event) = CallbackEventType::parse_str(event_type) else {
            return match self.policy {
                CallbackPolicy::Lenient => {
                    info!(bot_id = %bot_id, event_type, "Ignoring unknown callback event type");
                    Ok(CallbackOutcome::Ignored {
                        event_type: event_type.to_string(),
                    })
                }
                CallbackPolicy::Strict => {
                    warn!(bot_id = %bot_id, event_type, "Rejecting unknown callback event type");
                    Err(RelayError::UnknownEventType(event_type.to_string()))
                }
            };
        };

        let status = event.target_status();
        let outcome = match self.store.finish_ingestion(bot_id, status).await? {
            StatusTransition::Applied => {
                info!(bot_id = %bot_id, event = %event, status = %status, "Bot ingestion finished");
                CallbackOutcome::Applied { bot_id, status }
            }
            StatusTransition::Unchanged(current) => {
                info!(
                    bot_id = %bot_id,
                    event = %event,
                    current = %current,
                    "Callback for bot that is no longer pending"
                );
                CallbackOutcome::Unchanged { bot_id, current }
            }
            StatusTransition::NotFound => {
                warn!(bot_id = %bot_id, event = %event, "Callback for unknown bot");
                CallbackOutcome::UnknownBot { bot_id }
            }
        };

        Ok(outcome)
    }
}
