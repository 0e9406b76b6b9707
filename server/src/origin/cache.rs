//! Settings Cache
//!
//! Time-limited store for serialized bot allow-lists, keyed
//! `chatbot:settings:{bot_id}`. Entries are written once and left to expire;
//! nothing invalidates them when a tenant edits the allow-list.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fred::prelude::*;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

/// Redis key for a bot's cached settings.
pub fn settings_key(bot_id: Uuid) -> String {
    format!("chatbot:settings:{bot_id}")
}

/// Shared key-value cache with per-entry expiry.
#[async_trait]
pub trait SettingsCache: Send + Sync {
    async fn get(&self, key: &str) -> RelayResult<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> RelayResult<()>;
}

/// Redis-backed cache shared by every relay instance.
#[derive(Clone)]
pub struct RedisSettingsCache {
    redis: Client,
}

impl RedisSettingsCache {
    pub const fn new(redis: Client) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SettingsCache for RedisSettingsCache {
    async fn get(&self, key: &str) -> RelayResult<Option<String>> {
        self.redis
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| RelayError::Cache(e.to_string()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> RelayResult<()> {
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        self.redis
            .set::<(), _, _>(key, value, Some(Expiration::EX(seconds)), None, false)
            .await
            .map_err(|e| RelayError::Cache(e.to_string()))
    }
}

struct CachedValue {
    value: String,
    expires_at: Instant,
}

/// In-process cache used when no Redis is configured.
///
/// Deadlines use `tokio::time::Instant`, so a paused test clock controls expiry.
#[derive(Default)]
pub struct MemorySettingsCache {
    entries: DashMap<String, CachedValue>,
}

impl MemorySettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SettingsCache for MemorySettingsCache {
    async fn get(&self, key: &str) -> RelayResult<Option<String>> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }

        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> RelayResult<()> {
        self.entries.insert(
            key.to_string(),
            CachedValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
