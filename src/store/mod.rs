//! Message stores.
//!
//! A [`MessageStore`] offers exactly two operations: a live subscription to
//! the ordered tail of a room, and an atomic append of one message. There is
//! no update or delete.
//!
//! Both stores in this module publish insertions on a `broadcast` channel
//! and build subscriptions with the same forwarding task: the task first
//! yields the tail snapshot, then one batch per insertion into the room.
//! The broadcast receiver is taken before the snapshot is read so that no
//! insertion falls between the two.

mod memory;
#[cfg(feature = "sqlite")]
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use schema::MIGRATIONS;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::debug;

use crate::chat::{ChatMessage, NewChatMessage};

/// Capacity of a store's insertion broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Capacity of a single subscription's delivery queue.
const SUBSCRIPTION_BUFFER: usize = 32;

/// Errors reported by a message store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database failed.
    #[error("database error: {0}")]
    Database(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The subscriber fell behind and missed insertions.
    #[error("subscription lagged behind by {0} messages")]
    Lagged(u64),

    /// The store stopped delivering.
    #[error("subscription closed")]
    Closed,

    /// The write was refused.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The writer is sending faster than slow mode allows.
    #[error("slow mode active, retry in {seconds_remaining}s")]
    Throttled {
        /// Whole seconds until the next write is allowed.
        seconds_remaining: u64,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Timestamp for the next insertion: `now`, but never before `last`.
pub(crate) fn next_sent_at(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

/// A document store holding chat rooms.
pub trait MessageStore: Send + Sync {
    /// Subscribe to the last `limit` messages of `room`, ascending by
    /// `(sent_at, id)`.
    ///
    /// The first batch is the current tail; every later batch carries new
    /// insertions. Batches may repeat messages already delivered.
    fn subscribe_tail(
        &self,
        room: &str,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Subscription>> + Send;

    /// Append one message. The store assigns its ID and timestamp.
    fn append(
        &self,
        room: &str,
        message: NewChatMessage,
    ) -> impl Future<Output = StoreResult<ChatMessage>> + Send;
}

impl<S: MessageStore> MessageStore for Arc<S> {
    async fn subscribe_tail(&self, room: &str, limit: usize) -> StoreResult<Subscription> {
        (**self).subscribe_tail(room, limit).await
    }

    async fn append(&self, room: &str, message: NewChatMessage) -> StoreResult<ChatMessage> {
        (**self).append(room, message).await
    }
}

/// Event published by a store to its live subscribers.
#[derive(Debug, Clone)]
pub(crate) enum TailEvent {
    /// A message was appended to a room.
    Inserted {
        room: String,
        message: ChatMessage,
    },
    /// Delivery to every subscriber failed.
    Fault(StoreError),
}

/// A live tail subscription.
///
/// Dropping the subscription stops delivery.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<StoreResult<Vec<ChatMessage>>>,
    task: AbortHandle,
}

impl Subscription {
    /// Spawn the forwarding task for one subscriber.
    ///
    /// `events` must have been subscribed before `snapshot` was read.
    pub(crate) fn spawn(
        room: &str,
        snapshot: Vec<ChatMessage>,
        mut events: broadcast::Receiver<TailEvent>,
    ) -> Self {
        let room = room.to_string();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let handle = tokio::spawn(async move {
            if tx.send(Ok(snapshot)).await.is_err() {
                return;
            }
            loop {
                let item = match events.recv().await {
                    Ok(TailEvent::Inserted { room: r, message }) if r == room => Ok(vec![message]),
                    Ok(TailEvent::Inserted { .. }) => continue,
                    Ok(TailEvent::Fault(e)) => Err(e),
                    Err(broadcast::error::RecvError::Lagged(n)) => Err(StoreError::Lagged(n)),
                    Err(broadcast::error::RecvError::Closed) => Err(StoreError::Closed),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
            debug!(room = %room, "Tail subscription ended");
        });

        Self {
            rx,
            task: handle.abort_handle(),
        }
    }

    /// Wait for the next batch.
    ///
    /// Returns [`StoreError::Closed`] once the store has stopped delivering.
    pub async fn next_batch(&mut self) -> StoreResult<Vec<ChatMessage>> {
        self.rx.recv().await.unwrap_or(Err(StoreError::Closed))
    }

    /// Take a batch if one is already queued.
    pub fn try_next_batch(&mut self) -> Option<StoreResult<Vec<ChatMessage>>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
