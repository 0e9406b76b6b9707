//! Chatbot Relay Server - Main Entry Point

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use chatbot_relay::{api, config, db, engine, origin};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_relay=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        engine = ?config.engine,
        "Starting Chatbot Relay"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;
    let store: Arc<dyn db::BotStore> = Arc::new(db::PgBotStore::new(db_pool));

    // Settings cache: Redis when configured, in-process otherwise
    let cache: Arc<dyn origin::SettingsCache> = match &config.redis_url {
        Some(url) => Arc::new(origin::RedisSettingsCache::new(
            db::create_redis_client(url).await?,
        )),
        None => {
            tracing::warn!("REDIS_URL not set. Using in-process settings cache.");
            Arc::new(origin::MemorySettingsCache::new())
        }
    };

    let http = engine::build_http_client()?;

    // Build application state
    let state = api::AppState::new(config.clone(), store, cache, http);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
