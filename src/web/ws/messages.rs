//! WebSocket message types for the chat gateway.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatPanel, MessageId, Notice, Presentation};
use crate::session::{SessionObserver, SessionState};
use crate::store::MessageStore;

/// Messages sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sign in with a token from the identity provider.
    Authenticate {
        /// HS256 JWT.
        token: String,
    },
    /// Sign out.
    SignOut,
    /// Open the chat panel.
    Open,
    /// Close the chat panel.
    Close,
    /// The input box changed.
    Input {
        /// Raw text as typed.
        text: String,
    },
    /// Send the input box.
    Send,
    /// Dismiss a notice.
    DismissNotice {
        /// Notice ID.
        id: u64,
    },
    /// Ask for the room rules.
    Rules,
    /// Heartbeat ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session and panel status.
    Session {
        /// `resolving`, `signed_out` or `signed_in`.
        state: String,
        /// Panel status code.
        status: String,
        /// Panel status line.
        status_text: String,
        /// Signed-in participant.
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<UserInfo>,
        /// Whether the send control is enabled.
        can_send: bool,
    },
    /// Full contents of the live feed.
    Feed {
        /// Messages, oldest first.
        messages: Vec<FeedEntry>,
    },
    /// Input box contents after filtering.
    Input {
        /// Filtered text.
        text: String,
        /// Characters left.
        remaining: usize,
    },
    /// A new notice.
    Notice(Notice),
    /// Room rules.
    Rules {
        /// Rules in display order.
        rules: Vec<String>,
    },
    /// Heartbeat pong response.
    Pong,
    /// Protocol error.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
}

/// Signed-in participant as shown to the client.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    /// Participant ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Avatar URL.
    pub avatar_url: Option<String>,
}

/// One feed message with its presentation.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    /// Message ID.
    pub id: MessageId,
    /// Message text.
    pub text: String,
    /// Sender ID.
    pub sender_id: String,
    /// RFC 3339 timestamp.
    pub sent_at: String,
    /// How to render the message.
    pub presentation: Presentation,
}

impl FeedEntry {
    /// Build an entry from a message and its presentation.
    pub fn new(message: &ChatMessage, presentation: Presentation) -> Self {
        Self {
            id: message.id,
            text: message.text.clone(),
            sender_id: message.sender_id.clone(),
            sent_at: message.sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            presentation,
        }
    }
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Session and status of a panel.
    pub fn session<S: MessageStore, P: SessionObserver>(panel: &ChatPanel<S, P>) -> Self {
        let viewer = panel.viewer();
        let user = match viewer {
            SessionState::SignedIn(identity) => Some(UserInfo {
                id: identity.id.clone(),
                display_name: identity.display_name.clone(),
                avatar_url: identity.avatar_url.clone(),
            }),
            _ => None,
        };
        Self::Session {
            state: viewer.as_str().to_string(),
            status: panel.status().as_str().to_string(),
            status_text: panel.status().description().to_string(),
            user,
            can_send: panel.can_send(),
        }
    }

    /// Feed of a panel, resolved for its viewer.
    pub fn feed<S: MessageStore, P: SessionObserver>(panel: &ChatPanel<S, P>) -> Self {
        Self::Feed {
            messages: panel
                .presentations()
                .map(|(message, presentation)| FeedEntry::new(message, presentation))
                .collect(),
        }
    }

    /// Input box of a panel.
    pub fn input<S: MessageStore, P: SessionObserver>(panel: &ChatPanel<S, P>) -> Self {
        let input = panel.input_buffer();
        Self::Input {
            text: input.text().to_string(),
            remaining: input.remaining(),
        }
    }

    /// Room rules.
    pub fn rules(rules: &[&str]) -> Self {
        Self::Rules {
            rules: rules.iter().map(|r| r.to_string()).collect(),
        }
    }
}
