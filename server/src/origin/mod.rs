//! Origin Guard
//!
//! Per-bot allow-list of the web origins allowed to embed the chat widget.
//! Allow-lists are read through the settings cache and compared by exact
//! string match, with no subdomain or prefix matching.

pub mod cache;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

pub use cache::{settings_key, MemorySettingsCache, RedisSettingsCache, SettingsCache};

use crate::db::BotStore;
use crate::error::{RelayError, RelayResult};

/// Allow-list entry that permits every origin.
pub const WILDCARD: &str = "*";

/// Origins permitted to call the chat endpoint for one bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    /// Every origin, including an absent one.
    Any,
    /// Normalized `scheme://host[:port]` strings.
    Origins(Vec<String>),
}

impl AllowList {
    /// Build an allow-list from stored entries, normalizing each one.
    ///
    /// Exactly `["*"]` is the wildcard. Entries that are not bare http(s)
    /// origins are dropped; an empty result rejects every origin.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        if let [only] = entries {
            if only.as_ref().trim() == WILDCARD {
                return Self::Any;
            }
        }

        let mut origins: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref();
            match normalize_origin(entry) {
                Some(origin) => {
                    if !origins.contains(&origin) {
                        origins.push(origin);
                    }
                }
                None => warn!(entry = %entry, "Dropping invalid allow-list entry"),
            }
        }

        Self::Origins(origins)
    }

    /// Entries in stored form; `from_entries` maps them back to `self`.
    pub fn entries(&self) -> Vec<String> {
        match self {
            Self::Any => vec![WILDCARD.to_string()],
            Self::Origins(origins) => origins.clone(),
        }
    }

    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Check a request origin against this list.
    ///
    /// The wildcard admits everything, including an absent origin. Otherwise
    /// the origin must be present and equal one entry exactly.
    pub fn check(&self, origin: Option<&str>) -> RelayResult<()> {
        match self {
            Self::Any => Ok(()),
            Self::Origins(origins) => match origin {
                Some(origin) if origins.iter().any(|allowed| allowed == origin) => Ok(()),
                _ => Err(RelayError::Forbidden),
            },
        }
    }
}

/// Normalize a stored allow-list entry to `scheme://host[:port]`.
fn normalize_origin(entry: &str) -> Option<String> {
    let trimmed = entry.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().is_none()
        || !url.username().is_empty()
        || url.password().is_some()
        || url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
    {
        return None;
    }

    Some(url.origin().ascii_serialization())
}

/// Read the calling origin from request headers.
///
/// Uses `Origin` when present; otherwise falls back to the scheme, host and
/// port of `Referer`, discarding its path and query.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(origin) = origin {
        return Some(origin.to_string());
    }

    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())?;
    let url = Url::parse(referer.trim()).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Cached form of a bot's settings.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSettings {
    allowed_hosts: Vec<String>,
}

/// Resolves allow-lists cache-first and checks request origins against them.
#[derive(Clone)]
pub struct OriginGuard {
    cache: Arc<dyn SettingsCache>,
    store: Arc<dyn BotStore>,
    ttl: Duration,
}

impl OriginGuard {
    pub fn new(cache: Arc<dyn SettingsCache>, store: Arc<dyn BotStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    /// Allow-list for a bot, loaded from the store on a cache miss.
    ///
    /// Cache failures are logged and treated as misses. Concurrent misses may
    /// each read the store; the read is idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_allowed_origins(&self, bot_id: Uuid) -> RelayResult<AllowList> {
        let key = settings_key(bot_id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedSettings>(&raw) {
                Ok(settings) => {
                    debug!("Allow-list cache hit");
                    return Ok(AllowList::from_entries(&settings.allowed_hosts));
                }
                Err(e) => warn!(error = %e, "Discarding unreadable cached settings"),
            },
            Ok(None) => debug!("Allow-list cache miss"),
            Err(e) => warn!(error = %e, "Settings cache read failed, using store"),
        }

        let hosts = self
            .store
            .allowed_hosts(bot_id)
            .await?
            .ok_or(RelayError::BotNotFound)?;
        let allow_list = AllowList::from_entries(&hosts);

        let cached = CachedSettings {
            allowed_hosts: allow_list.entries(),
        };
        match serde_json::to_string(&cached) {
            Ok(value) => {
                if let Err(e) = self.cache.set_with_ttl(&key, &value, self.ttl).await {
                    warn!(error = %e, "Settings cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings for cache"),
        }

        Ok(allow_list)
    }

    /// Check a request's origin against an allow-list.
    pub fn check(origin: Option<&str>, allow_list: &AllowList) -> RelayResult<()> {
        allow_list.check(origin)
    }

    /// Resolve the bot's allow-list and check the request headers against it.
    pub async fn authorize(&self, bot_id: Uuid, headers: &HeaderMap) -> RelayResult<()> {
        let allow_list = self.resolve_allowed_origins(bot_id).await?;
        let origin = request_origin(headers);

        Self::check(origin.as_deref(), &allow_list).inspect_err(|_| {
            warn!(
                bot_id = %bot_id,
                origin = origin.as_deref().unwrap_or("<absent>"),
                "Rejected chat request from disallowed origin"
            );
        })
    }
}
