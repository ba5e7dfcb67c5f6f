//! WebSocket gateway for the chat panel.
//!
//! Browsers connect to `/api/chat/ws`, optionally with an identity provider
//! token, and drive a server-side chat panel with JSON messages.

pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use middleware::{GuardedStore, InboundLimiter, JwtClaims, JwtState, SendBackstop};
pub use router::{create_health_router, create_router};
pub use server::WebServer;
pub use ws::ChatWsState;
