//! Chatbot Handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::instrument;
use uuid::Uuid;

use super::types::{
    ChatResponse, DegradedChatResponse, MessageRequest, SubmissionAccepted, INVALID_ENGINE_JSON,
};
use crate::api::AppState;
use crate::engine::{ChatReply, SubmissionRequest, UploadedFile};
use crate::error::{RelayError, RelayResult};
use crate::markdown::strip_markdown;

fn parse_uuid(field: &str, value: &str) -> RelayResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| RelayError::Validation(format!("Invalid {field}")))
}

/// POST /api/chatbots/sources
///
/// Multipart fields: `user_id`, `bot_id`, `source_type`, and either `file` or
/// `url`. Answers 202 once the engine has accepted the submission.
#[instrument(skip(state, multipart))]
pub async fn submit_source(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> RelayResult<(StatusCode, Json<SubmissionAccepted>)> {
    let mut user_id: Option<Uuid> = None;
    let mut bot_id: Option<Uuid> = None;
    let mut source_type: Option<String> = None;
    let mut url: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Validation(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "file" => {
                let filename = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RelayError::Validation(e.body_text()))?;

                // Browsers send an empty part when no file was chosen
                if filename.as_deref().is_some_and(|n| !n.is_empty()) || !bytes.is_empty() {
                    file = Some(UploadedFile {
                        filename,
                        content_type,
                        bytes,
                    });
                }
            }
            "user_id" | "bot_id" | "source_type" | "url" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| RelayError::Validation(e.body_text()))?;
                match field_name.as_str() {
                    "user_id" => user_id = Some(parse_uuid("user_id", &text)?),
                    "bot_id" => bot_id = Some(parse_uuid("bot_id", &text)?),
                    "source_type" => source_type = Some(text),
                    _ => url = Some(text),
                }
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let request = SubmissionRequest {
        // Knowledge-base uploads are the common case
        source_type: source_type.unwrap_or_else(|| "file".to_string()),
        user_id: user_id.ok_or_else(|| RelayError::Validation("user_id is required".into()))?,
        bot_id: bot_id.ok_or_else(|| RelayError::Validation("bot_id is required".into()))?,
        file,
        url,
    };

    state.ingestion.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionAccepted { accepted: true }),
    ))
}

/// POST /api/chat/send-msg
///
/// Checks the caller's origin against the bot's allow-list, then relays the
/// message and returns the engine's answer as plain text.
#[instrument(skip(state, headers, payload), fields(bot_id = tracing::field::Empty))]
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> RelayResult<Response> {
    let Json(request) = payload.map_err(|e| RelayError::Validation(e.body_text()))?;
    tracing::Span::current().record("bot_id", tracing::field::display(request.bot_id));

    state.origin_guard.authorize(request.bot_id, &headers).await?;

    let response = match state.chat.send(&request.message, request.bot_id).await? {
        ChatReply::Answer {
            status_code,
            answer,
        } => Json(ChatResponse {
            status_code,
            answer: strip_markdown(&answer),
        })
        .into_response(),
        ChatReply::Degraded { status_code, raw } => Json(DegradedChatResponse {
            status_code,
            error: INVALID_ENGINE_JSON.to_string(),
            raw,
        })
        .into_response(),
    };

    tracing::debug!(visitor_id = %request.visitor_id, "Chat message relayed");
    Ok(response)
}
