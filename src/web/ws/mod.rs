//! WebSocket module for real-time chat.

pub mod chat;
pub mod messages;

pub use chat::{chat_ws_handler, handle_client_message, ChatWsState, ConnectionPanel, WsQuery};
pub use messages::{ClientMessage, FeedEntry, ServerMessage, UserInfo};
