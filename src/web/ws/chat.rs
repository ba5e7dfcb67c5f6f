//! Chat WebSocket handler.
//!
//! Every connection hosts its own [`ChatPanel`] driven by an in-process
//! [`LocalSession`]. The optional `token` query parameter signs the
//! connection in from the start; `authenticate` and `sign_out` messages
//! change the session later on.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;

use crate::chat::{ChatPanel, PanelEvent};
use crate::config::ChatConfig;
use crate::session::{Identity, LocalSession};
use crate::store::MessageStore;
use crate::web::middleware::{GuardedStore, InboundLimiter, JwtState, SendBackstop};

use super::messages::{ClientMessage, ServerMessage};

/// Panel type hosted by each connection.
pub type ConnectionPanel<S> = ChatPanel<GuardedStore<S>, Arc<LocalSession>>;

/// Query parameters for WebSocket connection.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WsQuery {
    /// Identity provider token. Absent for visitors.
    pub token: Option<String>,
}

/// State for WebSocket chat handler.
pub struct ChatWsState<S> {
    /// Message store shared by all connections.
    pub store: S,
    /// Token verification.
    pub jwt: JwtState,
    /// Shared per-participant send limiter.
    pub backstop: Arc<SendBackstop>,
    /// Chat settings for new panels.
    pub chat_config: ChatConfig,
}

impl<S: MessageStore + Clone> ChatWsState<S> {
    /// Create a new chat WebSocket state.
    pub fn new(store: S, jwt_secret: &str, chat_config: ChatConfig) -> Self {
        Self {
            store,
            jwt: JwtState::new(jwt_secret),
            backstop: Arc::new(SendBackstop::new(chat_config.cooldown())),
            chat_config,
        }
    }

    /// Create a panel for a new connection.
    pub fn create_panel(&self, session: Arc<LocalSession>) -> ConnectionPanel<S> {
        let store = GuardedStore::new(self.store.clone(), Arc::clone(&self.backstop));
        ChatPanel::new(store, session, self.chat_config.clone())
    }
}

/// WebSocket chat handler.
///
/// GET /api/chat/ws?token={jwt}
pub async fn chat_ws_handler<S>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatWsState<S>>>,
    Query(query): Query<WsQuery>,
) -> Response
where
    S: MessageStore + Clone + 'static,
{
    let identity = match query.token.as_deref() {
        Some(token) => match state.jwt.verify(token) {
            Ok(claims) => Some(claims.to_identity()),
            Err(e) => {
                tracing::debug!("WebSocket connection rejected: {}", e);
                return e.into_response();
            }
        },
        None => None,
    };

    match &identity {
        Some(identity) => tracing::info!("WebSocket connection from participant {}", identity.id),
        None => tracing::info!("WebSocket connection from visitor"),
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle a WebSocket connection.
async fn handle_socket<S>(socket: WebSocket, state: Arc<ChatWsState<S>>, identity: Option<Identity>)
where
    S: MessageStore + Clone + 'static,
{
    let connection_id = uuid::Uuid::new_v4();
    tracing::debug!("WebSocket session started: {}", connection_id);

    let session = Arc::new(match identity {
        Some(identity) => LocalSession::signed_in(identity),
        None => LocalSession::signed_out(),
    });
    let mut panel = state.create_panel(Arc::clone(&session));
    let inbound = InboundLimiter::default();
    let mut last_notice = 0;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    if !send_all(&mut ws_sender, vec![ServerMessage::session(&panel)]).await {
        return;
    }

    loop {
        let replies = tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(_))) if !inbound.check() => {
                    tracing::debug!("Inbound frame limit hit: {}", connection_id);
                    vec![ServerMessage::error("too_many_messages", "Slow down")]
                }
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_client_message(&mut panel, &session, &state.jwt, msg).await,
                    Err(e) => {
                        tracing::debug!("Failed to parse client message: {}", e);
                        vec![ServerMessage::error("invalid_message", "Invalid message format")]
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if ws_sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    Vec::new()
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!("WebSocket closed by client: {}", connection_id);
                    break;
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    tracing::debug!("WebSocket error: {}", e);
                    break;
                }
            },

            wake = panel.wait() => {
                let event = panel.apply(wake).await;
                event_replies(&panel, &event)
            }
        };

        let mut outgoing = replies;
        outgoing.extend(new_notices(&panel, &mut last_notice));
        if !send_all(&mut ws_sender, outgoing).await {
            break;
        }
    }

    panel.close();
    tracing::debug!("WebSocket session ended: {}", connection_id);
}

/// Handle a client message and return the replies.
pub async fn handle_client_message<S>(
    panel: &mut ConnectionPanel<S>,
    session: &LocalSession,
    jwt: &JwtState,
    msg: ClientMessage,
) -> Vec<ServerMessage>
where
    S: MessageStore,
{
    match msg {
        // Session changes reach the panel through its watch channel.
        ClientMessage::Authenticate { token } => match jwt.verify(&token) {
            Ok(claims) => {
                session.sign_in(claims.to_identity());
                Vec::new()
            }
            Err(e) => vec![ServerMessage::error("invalid_token", e.message())],
        },

        ClientMessage::SignOut => {
            session.sign_out();
            Vec::new()
        }

        ClientMessage::Open => {
            panel.open().await;
            vec![ServerMessage::session(panel), ServerMessage::feed(panel)]
        }

        ClientMessage::Close => {
            panel.close();
            vec![ServerMessage::session(panel), ServerMessage::feed(panel)]
        }

        ClientMessage::Input { text } => {
            panel.input(&text);
            vec![ServerMessage::input(panel)]
        }

        ClientMessage::Send => {
            if let Err(e) = panel.send().await {
                tracing::debug!("Send refused: {}", e);
            }
            vec![ServerMessage::input(panel)]
        }

        ClientMessage::DismissNotice { id } => {
            if panel.dismiss_notice(id) {
                Vec::new()
            } else {
                vec![ServerMessage::error("unknown_notice", "No such notice")]
            }
        }

        ClientMessage::Rules => vec![ServerMessage::rules(panel.rules())],

        ClientMessage::Ping => vec![ServerMessage::Pong],
    }
}

/// Replies for a panel event.
fn event_replies<S: MessageStore>(panel: &ConnectionPanel<S>, event: &PanelEvent) -> Vec<ServerMessage> {
    match event {
        PanelEvent::FeedUpdated { added: 0 } => Vec::new(),
        PanelEvent::FeedUpdated { .. } => vec![ServerMessage::feed(panel)],
        PanelEvent::SessionChanged(_) => vec![
            ServerMessage::session(panel),
            ServerMessage::feed(panel),
            ServerMessage::input(panel),
        ],
        PanelEvent::Disconnected(_) => vec![ServerMessage::session(panel)],
    }
}

/// Notices raised since the last call.
fn new_notices<S: MessageStore>(panel: &ConnectionPanel<S>, last_sent: &mut u64) -> Vec<ServerMessage> {
    let fresh: Vec<ServerMessage> = panel
        .notices()
        .iter()
        .filter(|n| n.id > *last_sent)
        .map(|n| ServerMessage::Notice(n.clone()))
        .collect();
    if let Some(newest) = panel.notices().iter().map(|n| n.id).max() {
        *last_sent = (*last_sent).max(newest);
    }
    fresh
}

/// Send messages in order. Returns false once the socket is gone.
async fn send_all(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    messages: Vec<ServerMessage>,
) -> bool {
    for msg in messages {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    return false;
                }
            }
            Err(e) => tracing::warn!("Failed to serialize server message: {}", e),
        }
    }
    true
}
