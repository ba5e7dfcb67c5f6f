//! Identity-to-presentation resolution for feed entries.

use serde::Serialize;

use super::message::ChatMessage;
use crate::session::SessionState;

/// Bot avatar image.
pub const BOT_AVATAR_URL: &str = "https://placehold.co/40x40/A050C3/FFFFFF.png";

/// Horizontal placement of a message bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Bot and other participants.
    Left,
    /// The current participant's own messages.
    Right,
}

/// Where the avatar next to a bubble comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Avatar {
    /// The fixed bot avatar.
    Bot,
    /// An image URL.
    Url(String),
    /// Letter fallback when no image is available.
    Initial(char),
}

/// Bubble styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleStyle {
    /// Bot/system messages.
    Bot,
    /// The current participant's own messages.
    Own,
    /// Other participants' messages.
    Other,
}

/// How one feed entry is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    /// Bubble placement.
    pub alignment: Alignment,
    /// Avatar source.
    pub avatar: Avatar,
    /// Bubble styling.
    pub style: BubbleStyle,
    /// Name shown above the bubble.
    pub name: String,
    /// `HH:MM` label (UTC).
    pub time_label: String,
}

fn initial(name: &str) -> char {
    name.chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?')
}

/// Decide how a message is rendered for the current session.
///
/// Own messages use the live session avatar rather than the snapshot stored
/// with the message, so a profile picture change shows up immediately in the
/// participant's own history. The displayed name is always the snapshot.
pub fn resolve(message: &ChatMessage, session: &SessionState) -> Presentation {
    let time_label = message.sent_at.format("%H:%M").to_string();
    let name = message.sender_display_name.clone();

    if message.is_bot() {
        return Presentation {
            alignment: Alignment::Left,
            avatar: Avatar::Bot,
            style: BubbleStyle::Bot,
            name,
            time_label,
        };
    }

    match session.identity() {
        Some(me) if me.id == message.sender_id => Presentation {
            alignment: Alignment::Right,
            avatar: match &me.avatar_url {
                Some(url) => Avatar::Url(url.clone()),
                None => Avatar::Initial(initial(&me.display_name)),
            },
            style: BubbleStyle::Own,
            name,
            time_label,
        },
        _ => Presentation {
            alignment: Alignment::Left,
            avatar: match &message.sender_avatar_url {
                Some(url) => Avatar::Url(url.clone()),
                None => Avatar::Initial(initial(&message.sender_display_name)),
            },
            style: BubbleStyle::Other,
            name,
            time_label,
        },
    }
}
