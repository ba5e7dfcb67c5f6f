//! Degen Chat delivery channel.
//!
//! This module provides the chat panel and its building blocks:
//! - Message records and the bot sentinel
//! - Continuous input sanitization and the length bound
//! - The bounded live feed
//! - Identity-to-presentation resolution
//! - The error taxonomy and dismissable notices
//! - Room rules

mod feed;
mod message;
mod notice;
mod panel;
mod presentation;
mod rules;
mod sanitize;

pub use feed::{LiveFeed, DEFAULT_WINDOW_SIZE};
pub use message::{ChatMessage, MessageId, NewChatMessage, BOT_NAME, BOT_SENDER_ID};
pub use notice::{ChatError, Notice, NoticeSeverity, Notices, MAX_PENDING_NOTICES};
pub use panel::{ChatPanel, PanelEvent, PanelStatus, PanelWake, ANONYMOUS_PROMPT};
pub use presentation::{resolve, Alignment, Avatar, BubbleStyle, Presentation, BOT_AVATAR_URL};
pub use rules::{format_rules, CHAT_RULES};
pub use sanitize::{
    is_allowed_char, prepare_message, sanitize, InputBuffer, ValidationReason,
    ALLOWED_PUNCTUATION, MAX_MESSAGE_LENGTH,
};
