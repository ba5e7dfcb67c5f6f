//! Router configuration for the gateway.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::create_cors_layer;
use super::ws::{chat_ws_handler, ChatWsState};
use crate::store::MessageStore;

/// Create the main router.
pub fn create_router<S>(state: Arc<ChatWsState<S>>, cors_origins: &[String]) -> Router
where
    S: MessageStore + Clone + 'static,
{
    let api_routes = Router::new()
        .route("/chat/ws", get(chat_ws_handler::<S>))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::store::MemoryStore;

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
    }

    #[test]
    fn test_create_router() {
        let state = Arc::new(ChatWsState::new(
            Arc::new(MemoryStore::new()),
            "secret",
            ChatConfig::default(),
        ));
        let _router = create_router(state, &[]);
    }
}
