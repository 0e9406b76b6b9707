//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router, backed by the in-memory bot store and settings cache.
//!
//! ## Fake Automation Engine
//!
//! Use [`spawn_test_server()`] with a small axum router to stand in for the
//! engine, then point the app at it with [`TestApp::with_engine()`].
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use chatbot_relay::api::{create_router, AppState};
use chatbot_relay::config::Config;
use chatbot_relay::db::{BotStatus, MemoryBotStore};
use chatbot_relay::engine::build_http_client;
use chatbot_relay::origin::MemorySettingsCache;
use chatbot_relay::webhooks::signing;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

/// Ingestion webhook path on the fake engine.
pub const INGEST_PATH: &str = "/webhook/knowledgebase";

/// Chat path on the fake engine.
pub const CHAT_PATH: &str = "/webhook/chat";

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub config: Arc<Config>,
    pub store: Arc<MemoryBotStore>,
    pub cache: Arc<MemorySettingsCache>,
}

impl TestApp {
    /// Create a test app whose engine URLs point at a closed port.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app talking to a fake engine at `engine_url`.
    pub fn with_engine(engine_url: &str) -> Self {
        Self::with_config(engine_config(engine_url))
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryBotStore::new());
        let cache = Arc::new(MemorySettingsCache::new());
        let http = build_http_client().expect("Failed to build HTTP client");

        let state = AppState::new(config.clone(), store.clone(), cache.clone(), http);
        let router = create_router(state);

        Self {
            router,
            config: Arc::new(config),
            store,
            cache,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Register a bot in the memory store and return its id.
    pub fn create_bot(&self, status: BotStatus, allowed_hosts: &[&str]) -> Uuid {
        let bot_id = Uuid::new_v4();
        self.store.insert(
            bot_id,
            status,
            allowed_hosts.iter().map(ToString::to_string).collect(),
        );
        bot_id
    }

    /// Sign a callback body with the configured secret.
    pub fn sign(&self, body: &[u8]) -> String {
        signing::sign_payload(&self.config.engine.callback_secret, body)
            .expect("Failed to sign payload")
    }
}

/// Test config pointing both engine endpoints at `engine_url`.
pub fn engine_config(engine_url: &str) -> Config {
    let mut config = Config::default_for_test();
    config.engine.ingest_url = format!("{engine_url}{INGEST_PATH}");
    config.engine.chat_url = format!("{engine_url}{CHAT_PATH}");
    config
}

/// Base URL of a local port nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}")
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: &'static str,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----RelayTestBoundary",
            buf: Vec::new(),
        }
    }

    /// Add a text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file field.
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Finish the body; returns the `Content-Type` header value and the body.
    pub fn finish(mut self) -> (String, Body) {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            Body::from(self.buf),
        )
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
