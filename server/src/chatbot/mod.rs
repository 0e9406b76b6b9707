//! Chatbot Endpoints
//!
//! Knowledge-base submission and the public chat endpoint used by the
//! embeddable widget.

pub mod handlers;
pub mod types;

use axum::routing::post;
use axum::Router;

use crate::api::AppState;

/// Routes mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chatbots/sources", post(handlers::submit_source))
        .route("/chat/send-msg", post(handlers::send_message))
        .route(
            "/chatbot-status",
            post(crate::webhooks::handlers::chatbot_status),
        )
}
