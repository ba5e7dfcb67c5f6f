//! Test helpers for chat panel and gateway tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gamblr_chat::chat::{ChatPanel, PanelEvent};
use gamblr_chat::config::ChatConfig;
use gamblr_chat::session::{Identity, LocalSession, SessionObserver};
use gamblr_chat::store::{MemoryStore, MessageStore};
use gamblr_chat::web::JwtClaims;
use jsonwebtoken::{encode, EncodingKey, Header};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Secret shared by test tokens and test servers.
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// Scheduler turns given to background tasks by [`settle`].
const SETTLE_ROUNDS: usize = 32;

/// Panel over the in-memory store.
pub type TestPanel = ChatPanel<Arc<MemoryStore>, Arc<LocalSession>>;

/// Participant "u1", shown as Ann.
pub fn ann() -> Identity {
    Identity::new("u1", "Ann").with_avatar("https://cdn.example.com/ann.png")
}

/// Participant "u2", shown as Bob, without an avatar.
pub fn bob() -> Identity {
    Identity::new("u2", "Bob")
}

/// Create a closed panel over `store`.
pub fn create_panel(store: &Arc<MemoryStore>, session: &Arc<LocalSession>) -> TestPanel {
    ChatPanel::new(Arc::clone(store), Arc::clone(session), ChatConfig::default())
}

/// Create a signed-in session and an open panel for it.
pub async fn open_panel_as(store: &Arc<MemoryStore>, identity: Identity) -> (Arc<LocalSession>, TestPanel) {
    let session = Arc::new(LocalSession::signed_in(identity));
    let mut panel = create_panel(store, &session);
    panel.open().await;
    settle(&mut panel).await;
    (session, panel)
}

/// Let background delivery run, then apply everything that is ready.
///
/// Never sleeps, so it is safe under paused time.
pub async fn settle<S, P>(panel: &mut ChatPanel<S, P>) -> Vec<PanelEvent>
where
    S: MessageStore,
    P: SessionObserver,
{
    let mut events = Vec::new();
    for _ in 0..SETTLE_ROUNDS {
        tokio::task::yield_now().await;
        while let Some(wake) = panel.try_wait() {
            events.push(panel.apply(wake).await);
        }
    }
    events
}

/// Wait for the next panel event, failing the test after [`DEFAULT_TIMEOUT`].
pub async fn next_event<S, P>(panel: &mut ChatPanel<S, P>) -> PanelEvent
where
    S: MessageStore,
    P: SessionObserver,
{
    tokio::time::timeout(DEFAULT_TIMEOUT, panel.next_event())
        .await
        .expect("Timed out waiting for a panel event")
}

/// Texts currently shown by a panel, oldest first.
pub fn feed_texts<S, P>(panel: &ChatPanel<S, P>) -> Vec<String>
where
    S: MessageStore,
    P: SessionObserver,
{
    panel.feed().messages().iter().map(|m| m.text.clone()).collect()
}

/// Signed token for `identity`, valid for an hour.
pub fn create_token(identity: &Identity) -> String {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = JwtClaims {
        sub: identity.id.clone(),
        name: identity.display_name.clone(),
        picture: identity.avatar_url.clone(),
        email: identity.email.clone(),
        email_verified: identity.email_verified,
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}
