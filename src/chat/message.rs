//! Chat message records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Identity;

/// Sender ID reserved for the chat bot and system messages.
pub const BOT_SENDER_ID: &str = "gamblr-bot";

/// Display name of the chat bot.
pub const BOT_NAME: &str = "Gamblr Nation Bot";

/// Store-assigned message identifier.
///
/// Opaque to callers. Identifiers are ordered by insertion, which is only
/// used to break `sent_at` ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Store-assigned ID.
    pub id: MessageId,
    /// Sanitized message text.
    pub text: String,
    /// Sender's participant ID, or [`BOT_SENDER_ID`].
    pub sender_id: String,
    /// Sender's display name at the time of sending.
    pub sender_display_name: String,
    /// Sender's avatar at the time of sending.
    pub sender_avatar_url: Option<String>,
    /// Store-assigned timestamp.
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether the message was sent by the bot.
    pub fn is_bot(&self) -> bool {
        self.sender_id == BOT_SENDER_ID
    }

    /// Ordering key within a room.
    pub fn order_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.sent_at, self.id)
    }

    /// Local bot message that is shown but never stored.
    pub(crate) fn local_bot(id: i64, text: impl Into<String>) -> Self {
        Self {
            id: MessageId(id),
            text: text.into(),
            sender_id: BOT_SENDER_ID.to_string(),
            sender_display_name: BOT_NAME.to_string(),
            sender_avatar_url: None,
            sent_at: Utc::now(),
        }
    }

    /// Format the message for plain-text display.
    pub fn format(&self) -> String {
        format!("<{}> {}", self.sender_display_name, self.text)
    }
}

/// A message ready to be appended to a room.
///
/// Carries no ID or timestamp; the store assigns both on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    /// Sanitized message text.
    pub text: String,
    /// Sender's participant ID.
    pub sender_id: String,
    /// Sender's display name.
    pub sender_display_name: String,
    /// Sender's avatar.
    pub sender_avatar_url: Option<String>,
}

impl NewChatMessage {
    /// Build a message on behalf of a signed-in participant.
    pub fn from_identity(identity: &Identity, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender_id: identity.id.clone(),
            sender_display_name: identity.display_name.clone(),
            sender_avatar_url: identity.avatar_url.clone(),
        }
    }

    /// Build a bot message.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender_id: BOT_SENDER_ID.to_string(),
            sender_display_name: BOT_NAME.to_string(),
            sender_avatar_url: None,
        }
    }

    /// Attach the store-assigned ID and timestamp.
    pub fn into_stored(self, id: MessageId, sent_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id,
            text: self.text,
            sender_id: self.sender_id,
            sender_display_name: self.sender_display_name,
            sender_avatar_url: self.sender_avatar_url,
            sent_at,
        }
    }
}
