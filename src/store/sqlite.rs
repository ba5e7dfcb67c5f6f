//! SQLite-backed message store.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::schema::MIGRATIONS;
use super::{
    next_sent_at, MessageStore, StoreError, StoreResult, Subscription, TailEvent,
    DEFAULT_EVENT_CAPACITY,
};
use crate::chat::{ChatMessage, MessageId, NewChatMessage};
use crate::Result;

/// Database row type for ChatMessage.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    text: String,
    sender_id: String,
    sender_name: String,
    sender_avatar: Option<String>,
    sent_at: String,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        let sent_at = match decode_timestamp(&row.sent_at) {
            Some(at) => at,
            None => {
                warn!(id = row.id, sent_at = %row.sent_at, "Unreadable message timestamp");
                Utc::now()
            }
        };

        Self {
            id: MessageId(row.id),
            text: row.text,
            sender_id: row.sender_id,
            sender_display_name: row.sender_name,
            sender_avatar_url: row.sender_avatar,
            sent_at,
        }
    }
}

/// Fixed-width timestamp encoding, so text order equals time order.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Message store persisted in SQLite.
///
/// Live notifications only reach subscribers of the same `SqliteStore`
/// value; share it behind an `Arc` rather than opening the file twice.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    events: broadcast::Sender<TailEvent>,
    /// Newest `sent_at` written; held for the whole insert.
    last_sent_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl SqliteStore {
    /// Open the database at `path`, creating it if needed, and apply
    /// pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let store = Self {
            pool,
            events,
            last_sent_at: Arc::new(Mutex::new(None)),
        };
        store.migrate().await?;

        let newest: Option<String> = sqlx::query_scalar("SELECT MAX(sent_at) FROM chat_messages")
            .fetch_one(&store.pool)
            .await?;
        *store.last_sent_at.lock().await = newest.as_deref().and_then(decode_timestamp);

        Ok(store)
    }

    /// Connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        )
        .fetch_one(&self.pool)
        .await?;

        if !table_exists {
            return Ok(0);
        }

        let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;
        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!("Migration v{} applied successfully", version);
        }

        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Number of messages stored in a room.
    pub async fn count(&self, room: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE room = ?")
            .bind(room)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn tail(&self, room: &str, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, text, sender_id, sender_name, sender_avatar, sent_at
             FROM chat_messages
             WHERE room = ?
             ORDER BY sent_at DESC, id DESC
             LIMIT ?",
        )
        .bind(room)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().rev().map(ChatMessage::from).collect())
    }
}

impl MessageStore for SqliteStore {
    async fn subscribe_tail(&self, room: &str, limit: usize) -> StoreResult<Subscription> {
        let events = self.events.subscribe();
        let snapshot = self.tail(room, limit).await?;
        debug!(room, count = snapshot.len(), "SQLite tail subscription");
        Ok(Subscription::spawn(room, snapshot, events))
    }

    async fn append(&self, room: &str, message: NewChatMessage) -> StoreResult<ChatMessage> {
        // Timestamps never go backwards within the store.
        let mut last_sent_at = self.last_sent_at.lock().await;
        let sent_at = next_sent_at(*last_sent_at, Utc::now());
        let encoded = encode_timestamp(sent_at);

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO chat_messages (room, text, sender_id, sender_name, sender_avatar, sent_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(room)
        .bind(&message.text)
        .bind(&message.sender_id)
        .bind(&message.sender_display_name)
        .bind(&message.sender_avatar_url)
        .bind(&encoded)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
            other => StoreError::from(other),
        })?;

        // Round-trip through the stored encoding so live and reloaded
        // messages compare equal.
        let sent_at = decode_timestamp(&encoded).unwrap_or(sent_at);
        *last_sent_at = Some(sent_at);
        drop(last_sent_at);

        let stored = message.into_stored(MessageId(id), sent_at);

        let _ = self.events.send(TailEvent::Inserted {
            room: room.to_string(),
            message: stored.clone(),
        });
        Ok(stored)
    }
}
