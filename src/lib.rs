//! Gamblr Chat - the Degen Chat delivery channel of Gamblr Nation.
//!
//! A chat panel showing the live tail of one shared room, with continuous
//! input sanitization, per-participant slow mode and identity-aware
//! presentation, plus the stores and WebSocket gateway that host it.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod web;

pub use chat::{ChatError, ChatMessage, ChatPanel, NewChatMessage, PanelEvent, PanelStatus};
pub use config::Config;
pub use error::{GamblrError, Result};
pub use session::{Identity, LocalSession, SessionObserver, SessionState};
pub use store::{MemoryStore, MessageStore, StoreError, Subscription};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use web::WebServer;
