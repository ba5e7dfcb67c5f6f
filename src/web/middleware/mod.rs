//! Middleware for the gateway.

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{JwtClaims, JwtState};
pub use cors::create_cors_layer;
pub use rate_limit::{GuardedStore, InboundLimiter, SendBackstop, SendPermit};
