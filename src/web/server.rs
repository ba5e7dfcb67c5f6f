//! Web server for the chat gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{ChatConfig, WebConfig};
use crate::store::MessageStore;
use crate::{GamblrError, Result};

use super::router::create_router;
use super::ws::ChatWsState;

/// Web server for the gateway.
pub struct WebServer<S> {
    /// Server address.
    addr: SocketAddr,
    /// Shared connection state.
    state: Arc<ChatWsState<S>>,
    /// Web configuration.
    web_config: WebConfig,
}

impl<S> WebServer<S>
where
    S: MessageStore + Clone + 'static,
{
    /// Create a new web server.
    pub fn new(config: &WebConfig, chat_config: &ChatConfig, store: S) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| GamblrError::Config(format!("invalid web server address: {e}")))?;

        let state = Arc::new(ChatWsState::new(
            store,
            &config.jwt_secret,
            chat_config.clone(),
        ));

        Ok(Self {
            addr,
            state,
            web_config: config.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared connection state.
    pub fn state(&self) -> &Arc<ChatWsState<S>> {
        &self.state
    }

    async fn bind(self) -> Result<(TcpListener, axum::Router)> {
        let router = create_router(Arc::clone(&self.state), &self.web_config.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;

        Arc::clone(&self.state.backstop).start_cleanup_task();
        tracing::debug!("Send backstop cleanup task started");

        Ok((listener, router))
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let (listener, router) = self.bind().await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
