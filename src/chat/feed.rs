//! Bounded live view of a room's most recent messages.

use super::message::{ChatMessage, MessageId};

/// Default number of messages kept in the live view.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Ordered, de-duplicated window over the tail of a room.
///
/// Messages are kept in ascending `(sent_at, id)` order. Merging never moves
/// a message relative to the ones already shown; it only inserts new ones at
/// their position and drops the oldest beyond the window.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    messages: Vec<ChatMessage>,
    window_size: usize,
}

impl LiveFeed {
    /// Create an empty feed holding at most `window_size` messages.
    pub fn new(window_size: usize) -> Self {
        Self {
            messages: Vec::with_capacity(window_size),
            window_size: window_size.max(1),
        }
    }

    /// Merge a delivered batch.
    ///
    /// Returns the number of messages that were not already present.
    pub fn merge<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        let mut inserted = 0;
        for message in batch {
            if self.contains(message.id) {
                continue;
            }
            let key = message.order_key();
            let pos = self.messages.partition_point(|m| m.order_key() <= key);
            self.messages.insert(pos, message);
            inserted += 1;
        }

        if self.messages.len() > self.window_size {
            let excess = self.messages.len() - self.window_size;
            self.messages.drain(..excess);
        }
        inserted
    }

    /// Replace the feed with a single local message.
    pub fn show_only(&mut self, message: ChatMessage) {
        self.messages.clear();
        self.messages.push(message);
    }

    /// Whether a message is displayed.
    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Displayed messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of displayed messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is displayed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maximum number of displayed messages.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
