//! Bot Store
//!
//! The slice of the chatbot record the relay reads and writes: the origin
//! allow-list and the ingestion status.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RelayResult;

/// Bot lifecycle status, matching the `bot_status` `PostgreSQL` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bot_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Content submitted, waiting for the engine to finish ingestion.
    Pending,
    /// Knowledge base ingested; the bot can answer.
    Active,
    /// Archived by its owner.
    Archived,
    /// The engine reported an ingestion failure.
    Failed,
}

impl BotStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking the store to finish an ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The bot was pending and now has the requested status.
    Applied,
    /// The bot exists but was not pending; its status is left as is.
    Unchanged(BotStatus),
    /// No bot with that id.
    NotFound,
}

/// Tenant store consulted by the relay.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Raw allow-list entries for a bot, or `None` if the bot does not exist.
    async fn allowed_hosts(&self, bot_id: Uuid) -> RelayResult<Option<Vec<String>>>;

    /// Move a pending bot to a terminal ingestion status.
    async fn finish_ingestion(
        &self,
        bot_id: Uuid,
        status: BotStatus,
    ) -> RelayResult<StatusTransition>;
}

/// `PostgreSQL`-backed store over the `chatbots` table.
#[derive(Clone)]
pub struct PgBotStore {
    pool: PgPool,
}

impl PgBotStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotStore for PgBotStore {
    #[tracing::instrument(skip(self))]
    async fn allowed_hosts(&self, bot_id: Uuid) -> RelayResult<Option<Vec<String>>> {
        let row: Option<(Json<Vec<String>>,)> =
            sqlx::query_as("SELECT allowed_hosts FROM chatbots WHERE id = $1")
                .bind(bot_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(hosts),)| hosts))
    }

    #[tracing::instrument(skip(self))]
    async fn finish_ingestion(
        &self,
        bot_id: Uuid,
        status: BotStatus,
    ) -> RelayResult<StatusTransition> {
        let updated: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE chatbots SET status = $2 WHERE id = $1 AND status = 'pending' RETURNING id",
        )
        .bind(bot_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(StatusTransition::Applied);
        }

        let current: Option<(BotStatus,)> =
            sqlx::query_as("SELECT status FROM chatbots WHERE id = $1")
                .bind(bot_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(current.map_or(StatusTransition::NotFound, |(s,)| {
            StatusTransition::Unchanged(s)
        }))
    }
}

/// A bot record held by [`MemoryBotStore`].
#[derive(Debug, Clone)]
pub struct MemoryBot {
    pub status: BotStatus,
    pub allowed_hosts: Vec<String>,
}

/// In-process store for tests and database-less local runs.
///
/// Counts allow-list lookups so callers can observe cache hits.
#[derive(Default)]
pub struct MemoryBotStore {
    bots: DashMap<Uuid, MemoryBot>,
    host_lookups: AtomicUsize,
}

impl MemoryBotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a bot.
    pub fn insert(&self, bot_id: Uuid, status: BotStatus, allowed_hosts: Vec<String>) {
        self.bots.insert(
            bot_id,
            MemoryBot {
                status,
                allowed_hosts,
            },
        );
    }

    /// Replace a bot's allow-list, as a tenant settings update would.
    pub fn set_allowed_hosts(&self, bot_id: Uuid, allowed_hosts: Vec<String>) {
        if let Some(mut bot) = self.bots.get_mut(&bot_id) {
            bot.allowed_hosts = allowed_hosts;
        }
    }

    /// Reset a bot to pending, as a new submission would.
    pub fn reset_pending(&self, bot_id: Uuid) {
        if let Some(mut bot) = self.bots.get_mut(&bot_id) {
            bot.status = BotStatus::Pending;
        }
    }

    pub fn status(&self, bot_id: Uuid) -> Option<BotStatus> {
        self.bots.get(&bot_id).map(|bot| bot.status)
    }

    /// Number of `allowed_hosts` calls served so far.
    pub fn host_lookups(&self) -> usize {
        self.host_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BotStore for MemoryBotStore {
    async fn allowed_hosts(&self, bot_id: Uuid) -> RelayResult<Option<Vec<String>>> {
        self.host_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.bots.get(&bot_id).map(|bot| bot.allowed_hosts.clone()))
    }

    async fn finish_ingestion(
        &self,
        bot_id: Uuid,
        status: BotStatus,
    ) -> RelayResult<StatusTransition> {
        let Some(mut bot) = self.bots.get_mut(&bot_id) else {
            return Ok(StatusTransition::NotFound);
        };

        if bot.status != BotStatus::Pending {
            return Ok(StatusTransition::Unchanged(bot.status));
        }

        bot.status = status;
        Ok(StatusTransition::Applied)
    }
}
