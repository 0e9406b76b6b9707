//! HTTP Integration Tests for the Chat Relay
//!
//! A fake automation engine runs on a random local port.
//!
//! Run with: `cargo test --test chat_http_test -- --nocapture`

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chatbot_relay::db::BotStatus;
use helpers::{body_to_json, spawn_test_server, TestApp, CHAT_PATH};
use serde_json::{json, Value};
use uuid::Uuid;

/// Fake engine answering every chat call with `reply`; counts calls.
async fn engine_replying(reply: Value) -> (helpers::TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        CHAT_PATH,
        post(move || {
            let counter = counter.clone();
            let reply = reply.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(reply)
            }
        }),
    );
    (spawn_test_server(router).await, calls)
}

fn chat_request(bot_id: Uuid, origin: Option<&str>) -> axum::http::Request<Body> {
    let body = json!({
        "message": "When are you open?",
        "bot_id": bot_id,
        "visitor_id": Uuid::new_v4(),
    });
    let mut req = TestApp::request(Method::POST, "/api/chat/send-msg")
        .header("Content-Type", "application/json");
    if let Some(origin) = origin {
        req = req.header("Origin", origin);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_allowed_origin_gets_plain_text_answer() {
    let (engine, calls) = engine_replying(json!([{ "output": "We are open **9 to 5**." }])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["https://shop.example.com"]);

    let resp = app
        .oneshot(chat_request(bot_id, Some("https://shop.example.com")))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_to_json(resp).await;
    assert_eq!(json["status_code"], 200);
    assert_eq!(json["answer"], "We are open 9 to 5.");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden_before_engine_call() {
    let (engine, calls) = engine_replying(json!([{ "output": "hi" }])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["https://shop.example.com"]);

    let resp = app
        .oneshot(chat_request(bot_id, Some("https://evil.example.net")))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "ORIGIN_NOT_ALLOWED");

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wildcard_allows_any_or_missing_origin() {
    let (engine, _) = engine_replying(json!([{ "output": "hi" }])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["*"]);

    let resp = app
        .oneshot(chat_request(bot_id, Some("https://anywhere.example")))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_referer_used_when_origin_absent() {
    let (engine, _) = engine_replying(json!([{ "output": "hi" }])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["https://shop.example.com"]);

    let body = json!({ "message": "hi", "bot_id": bot_id, "visitor_id": Uuid::new_v4() });
    let req = TestApp::request(Method::POST, "/api/chat/send-msg")
        .header("Content-Type", "application/json")
        .header("Referer", "https://shop.example.com/products/42?ref=widget")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_allow_list_is_cached() {
    let (engine, _) = engine_replying(json!([{ "output": "hi" }])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["https://shop.example.com"]);

    for _ in 0..3 {
        let resp = app
            .oneshot(chat_request(bot_id, Some("https://shop.example.com")))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(app.store.host_lookups(), 1);
    assert_eq!(app.cache.len(), 1);
}

#[tokio::test]
async fn test_unknown_bot_returns_404() {
    let app = TestApp::new();

    let resp = app
        .oneshot(chat_request(Uuid::new_v4(), Some("https://shop.example.com")))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "BOT_NOT_FOUND");
}

#[tokio::test]
async fn test_empty_engine_reply_uses_placeholder() {
    let (engine, _) = engine_replying(json!([])).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["*"]);

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_to_json(resp).await;
    assert_eq!(json["answer"], "No message found");
}

#[tokio::test]
async fn test_non_json_engine_reply_is_degraded() {
    let router = Router::new().route(CHAT_PATH, post(|| async { "Workflow was started" }));
    let engine = spawn_test_server(router).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["*"]);

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_to_json(resp).await;
    assert_eq!(json["status_code"], 200);
    assert_eq!(json["raw"], "Workflow was started");
    assert_eq!(json["error"], "Invalid JSON returned from automation engine");
}

#[tokio::test]
async fn test_engine_error_returns_502() {
    let router = Router::new().route(
        CHAT_PATH,
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
    );
    let engine = spawn_test_server(router).await;
    let app = TestApp::with_engine(&engine.url);
    let bot_id = app.create_bot(BotStatus::Active, &["*"]);

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "UPSTREAM_REJECTED");
    assert_eq!(json["upstream_status"], 503);
}

#[tokio::test]
async fn test_unreachable_engine_returns_502() {
    let app = TestApp::with_engine(&helpers::closed_port_url().await);
    let bot_id = app.create_bot(BotStatus::Active, &["*"]);

    let resp = app.oneshot(chat_request(bot_id, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_invalid_json_body_returns_400() {
    let app = TestApp::new();

    let req = TestApp::request(Method::POST, "/api/chat/send-msg")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"message":"hi","bot_id":"not-a-uuid"}"#))
        .unwrap();

    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let resp = app
        .oneshot(TestApp::request(Method::GET, "/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["status"], "ok");
}
