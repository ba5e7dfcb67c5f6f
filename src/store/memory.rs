//! In-memory message store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{
    next_sent_at, MessageStore, StoreError, StoreResult, Subscription, TailEvent,
    DEFAULT_EVENT_CAPACITY,
};
use crate::chat::{ChatMessage, MessageId, NewChatMessage};

#[derive(Debug, Default)]
struct Rooms {
    next_id: i64,
    last_sent_at: Option<DateTime<Utc>>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

/// Message store kept in process memory.
///
/// Besides serving the live chat when no database is configured, the store
/// records how it is used and can be told to fail, which the panel tests
/// rely on.
#[derive(Debug)]
pub struct MemoryStore {
    rooms: RwLock<Rooms>,
    events: broadcast::Sender<TailEvent>,
    subscribe_calls: AtomicUsize,
    append_calls: AtomicUsize,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty store whose subscribers may fall at most `capacity`
    /// insertions behind.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            rooms: RwLock::new(Rooms::default()),
            events,
            subscribe_calls: AtomicUsize::new(0),
            append_calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    /// All messages of a room in ascending order.
    pub async fn messages(&self, room: &str) -> Vec<ChatMessage> {
        self.rooms
            .read()
            .await
            .messages
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `subscribe_tail` calls so far.
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of `append` calls so far, including failed ones.
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Make every following append fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following subscribe fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Deliver an error to every live subscription.
    pub fn inject_fault(&self, error: StoreError) {
        debug!(error = %error, "Injecting store fault");
        let _ = self.events.send(TailEvent::Fault(error));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    async fn subscribe_tail(&self, room: &str, limit: usize) -> StoreResult<Subscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("subscribe refused".to_string()));
        }

        let events = self.events.subscribe();
        let snapshot = {
            let rooms = self.rooms.read().await;
            let all = rooms.messages.get(room).map(Vec::as_slice).unwrap_or(&[]);
            all[all.len().saturating_sub(limit)..].to_vec()
        };
        debug!(room, count = snapshot.len(), "Memory tail subscription");
        Ok(Subscription::spawn(room, snapshot, events))
    }

    async fn append(&self, room: &str, message: NewChatMessage) -> StoreResult<ChatMessage> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }

        let stored = {
            let mut rooms = self.rooms.write().await;
            rooms.next_id += 1;
            let id = MessageId(rooms.next_id);

            // Timestamps never go backwards within the store.
            let sent_at = next_sent_at(rooms.last_sent_at, Utc::now());
            rooms.last_sent_at = Some(sent_at);

            let stored = message.into_stored(id, sent_at);
            rooms
                .messages
                .entry(room.to_string())
                .or_default()
                .push(stored.clone());
            stored
        };

        let _ = self.events.send(TailEvent::Inserted {
            room: room.to_string(),
            message: stored.clone(),
        });
        Ok(stored)
    }
}
