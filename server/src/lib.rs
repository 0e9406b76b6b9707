//! Chatbot Relay Server
//!
//! Trusted relay between the chatbot platform and a workflow-automation
//! engine: forwards knowledge-base submissions and chat messages, enforces
//! per-bot origin allow-lists, and applies signed ingestion callbacks.

pub mod api;
pub mod chatbot;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod markdown;
pub mod origin;
pub mod webhooks;
