//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    chatbot,
    config::Config,
    db::BotStore,
    engine::{ChatRelay, IngestionRelay, UploadLimits},
    origin::{OriginGuard, SettingsCache},
    webhooks::{CallbackPolicy, CallbackProcessor},
};

/// Room left in the request body limit for the non-file multipart fields.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Origin allow-list enforcement for the chat endpoint
    pub origin_guard: OriginGuard,
    /// Knowledge-base submission relay
    pub ingestion: IngestionRelay,
    /// Chat relay
    pub chat: ChatRelay,
    /// Completion callback processor
    pub callbacks: CallbackProcessor,
}

impl AppState {
    /// Create new application state.
    ///
    /// `http` is the pooled client shared by both relays.
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn BotStore>,
        cache: Arc<dyn SettingsCache>,
        http: reqwest::Client,
    ) -> Self {
        let engine = Arc::new(config.engine.clone());
        let limits = UploadLimits {
            max_upload_size: config.max_upload_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
        };

        Self {
            origin_guard: OriginGuard::new(cache, store.clone(), config.settings_cache_ttl()),
            ingestion: IngestionRelay::new(http.clone(), engine.clone(), limits),
            chat: ChatRelay::new(http, engine),
            callbacks: CallbackProcessor::new(
                config.engine.callback_secret.clone(),
                store,
                CallbackPolicy::from_strict(config.strict_callback_events),
            ),
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.max_upload_size.saturating_add(FORM_OVERHEAD);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", chatbot::router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Uploads may exceed the 2MB default
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
