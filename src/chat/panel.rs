//! The chat panel: lifecycle, live feed ownership and message submission.

use std::future::pending;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::feed::LiveFeed;
use super::message::{ChatMessage, NewChatMessage};
use super::notice::{ChatError, Notice, Notices};
use super::presentation::{resolve, Presentation};
use super::rules::CHAT_RULES;
use super::sanitize::{prepare_message, InputBuffer};
use crate::config::ChatConfig;
use crate::rate_limit::ActionRateLimiter;
use crate::session::{SessionObserver, SessionState};
use crate::store::{MessageStore, StoreError, StoreResult, Subscription};

/// Local prompt shown to signed-out visitors. Never stored.
pub const ANONYMOUS_PROMPT: &str = "Welcome! Please log in or sign up to chat.";

/// ID of the local prompt message.
const PROMPT_MESSAGE_ID: i64 = 0;

/// What the panel is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    /// The panel is not open.
    Closed,
    /// Waiting for the identity provider.
    CheckingLogin,
    /// Signed out; only the local prompt is shown.
    LoginPrompt,
    /// Subscribed to the room.
    Live,
    /// The subscription failed; the last feed is kept.
    Disconnected,
}

impl PanelStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelStatus::Closed => "closed",
            PanelStatus::CheckingLogin => "checking_login",
            PanelStatus::LoginPrompt => "login_prompt",
            PanelStatus::Live => "live",
            PanelStatus::Disconnected => "disconnected",
        }
    }

    /// Status line shown in the panel header.
    pub fn description(&self) -> &'static str {
        match self {
            PanelStatus::Closed => "Chat closed",
            PanelStatus::CheckingLogin => "Checking login...",
            PanelStatus::LoginPrompt => "Log in to chat",
            PanelStatus::Live => "Live",
            PanelStatus::Disconnected => "Disconnected",
        }
    }
}

/// Something the panel reacted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// A batch was merged into the feed.
    FeedUpdated {
        /// Messages that were not displayed before.
        added: usize,
    },
    /// The session changed and the panel re-evaluated itself.
    SessionChanged(SessionState),
    /// The live subscription failed and was dropped.
    Disconnected(ChatError),
}

/// A wake-up returned by [`ChatPanel::wait`], applied with
/// [`ChatPanel::apply`].
#[derive(Debug)]
pub struct PanelWake(Wake);

#[derive(Debug)]
enum Wake {
    Batch(StoreResult<Vec<ChatMessage>>),
    Session(SessionState),
}

/// Chat panel for one viewer.
///
/// The panel is driven by a single task. It owns at most one live
/// subscription, which is dropped whenever the panel closes, the viewer
/// signs out or switches identity, or delivery fails. Slow mode history
/// lives as long as the panel itself, across reopening and sign-in changes.
pub struct ChatPanel<S, P> {
    store: S,
    session: P,
    session_rx: watch::Receiver<SessionState>,
    session_live: bool,
    config: ChatConfig,
    viewer: SessionState,
    is_open: bool,
    status: PanelStatus,
    subscription: Option<Subscription>,
    subscribed_as: Option<String>,
    feed: LiveFeed,
    input: InputBuffer,
    limiter: ActionRateLimiter,
    notices: Notices,
}

impl<S: MessageStore, P: SessionObserver> ChatPanel<S, P> {
    /// Create a closed panel.
    pub fn new(store: S, session: P, config: ChatConfig) -> Self {
        let mut session_rx = session.watch();
        let viewer = session_rx.borrow_and_update().clone();
        let limiter = ActionRateLimiter::new(config.cooldown());

        Self {
            feed: LiveFeed::new(config.window_size),
            input: InputBuffer::new(config.max_message_length),
            store,
            session,
            session_rx,
            session_live: true,
            config,
            viewer,
            is_open: false,
            status: PanelStatus::Closed,
            subscription: None,
            subscribed_as: None,
            limiter,
            notices: Notices::new(),
        }
    }

    /// Open the panel.
    ///
    /// Signed in: subscribes to the room tail. Signed out: shows the local
    /// prompt. Resolving: shows nothing until the session resolves.
    pub async fn open(&mut self) {
        info!(room = %self.config.room, session = self.viewer.as_str(), "Opening chat panel");
        self.is_open = true;
        self.evaluate().await;
    }

    /// Close the panel and drop the subscription.
    pub fn close(&mut self) {
        if self.is_open {
            info!(room = %self.config.room, "Closing chat panel");
        }
        self.is_open = false;
        self.unsubscribe();
        self.feed.clear();
        self.status = PanelStatus::Closed;
    }

    /// Close and open again, re-establishing the subscription.
    pub async fn reopen(&mut self) {
        self.close();
        self.open().await;
    }

    /// Wait until the subscription or the session has something to apply.
    ///
    /// Cancel safe: nothing is lost if the returned future is dropped.
    pub async fn wait(&mut self) -> PanelWake {
        enum Woke {
            Batch(StoreResult<Vec<ChatMessage>>),
            SessionChanged(bool),
        }

        loop {
            let subscription = self.subscription.as_mut();
            let session_live = self.session_live;
            let woke = tokio::select! {
                batch = async {
                    match subscription {
                        Some(sub) => sub.next_batch().await,
                        None => pending().await,
                    }
                } => Woke::Batch(batch),
                changed = self.session_rx.changed(), if session_live => {
                    Woke::SessionChanged(changed.is_ok())
                }
            };

            match woke {
                Woke::Batch(batch) => return PanelWake(Wake::Batch(batch)),
                Woke::SessionChanged(true) => {
                    let state = self.session_rx.borrow_and_update().clone();
                    return PanelWake(Wake::Session(state));
                }
                Woke::SessionChanged(false) => {
                    debug!("Session provider dropped");
                    self.session_live = false;
                }
            }
        }
    }

    /// A wake-up that is already available, without waiting.
    pub fn try_wait(&mut self) -> Option<PanelWake> {
        if self.session_live && self.session_rx.has_changed().unwrap_or(false) {
            let state = self.session_rx.borrow_and_update().clone();
            return Some(PanelWake(Wake::Session(state)));
        }
        self.subscription
            .as_mut()?
            .try_next_batch()
            .map(|batch| PanelWake(Wake::Batch(batch)))
    }

    /// Apply a wake-up returned by [`wait`](Self::wait).
    pub async fn apply(&mut self, wake: PanelWake) -> PanelEvent {
        match wake.0 {
            Wake::Batch(Ok(batch)) => {
                let added = self.feed.merge(batch);
                debug!(added, shown = self.feed.len(), "Merged feed batch");
                PanelEvent::FeedUpdated { added }
            }
            Wake::Batch(Err(e)) => {
                warn!(room = %self.config.room, error = %e, "Chat subscription failed");
                self.subscription = None;
                self.status = PanelStatus::Disconnected;
                let err = ChatError::SubscriptionError(e.to_string());
                self.raise(&err);
                PanelEvent::Disconnected(err)
            }
            Wake::Session(state) => {
                self.apply_session(state.clone()).await;
                PanelEvent::SessionChanged(state)
            }
        }
    }

    /// Wait for and apply the next event.
    ///
    /// Not cancel safe; use [`wait`](Self::wait) inside `select!`.
    pub async fn next_event(&mut self) -> PanelEvent {
        let wake = self.wait().await;
        self.apply(wake).await
    }

    /// Update the input box with newly typed text. Returns the filtered
    /// text actually kept.
    pub fn input(&mut self, raw: &str) -> &str {
        self.input.set(raw)
    }

    /// Send the contents of the input box.
    pub async fn send(&mut self) -> Result<ChatMessage, ChatError> {
        let text = self.input.text().to_string();
        self.submit(&text).await
    }

    /// Validate and append one message on behalf of the viewer.
    ///
    /// The input box is cleared before the write is awaited. The cooldown
    /// starts at the moment the message was accepted for submission, and
    /// only if the write succeeds.
    pub async fn submit(&mut self, raw: &str) -> Result<ChatMessage, ChatError> {
        let result = self.try_submit(raw).await;
        if let Err(e) = &result {
            self.raise(e);
        }
        result
    }

    async fn try_submit(&mut self, raw: &str) -> Result<ChatMessage, ChatError> {
        self.sync_session().await;

        let identity = match &self.viewer {
            SessionState::Resolving => return Err(ChatError::SessionResolving),
            SessionState::SignedOut => return Err(ChatError::NotAuthenticated),
            SessionState::SignedIn(identity) => identity.clone(),
        };

        let text = prepare_message(raw, self.config.max_message_length)
            .map_err(|reason| ChatError::ValidationFailed { reason })?;

        let accepted_at = Instant::now();
        let verdict = self.limiter.check_at(&identity.id, accepted_at);
        if !verdict.is_allowed() {
            return Err(ChatError::RateLimited {
                seconds_remaining: verdict.seconds_remaining(),
            });
        }

        let message = NewChatMessage::from_identity(&identity, text);
        self.input.clear();

        debug!(room = %self.config.room, sender = %identity.id, "Submitting chat message");
        match self.store.append(&self.config.room, message).await {
            Ok(stored) => {
                self.limiter.record_at(&identity.id, accepted_at);
                Ok(stored)
            }
            Err(StoreError::Throttled { seconds_remaining }) => {
                Err(ChatError::RateLimited { seconds_remaining })
            }
            Err(e) => Err(ChatError::StoreWriteFailed(e.to_string())),
        }
    }

    /// Apply a session change that has not been observed yet.
    async fn sync_session(&mut self) {
        if self.session_live && self.session_rx.has_changed().unwrap_or(false) {
            let state = self.session_rx.borrow_and_update().clone();
            self.apply_session(state).await;
        }
    }

    async fn apply_session(&mut self, state: SessionState) {
        debug!(from = self.viewer.as_str(), to = state.as_str(), "Session changed");
        self.viewer = state;
        if self.is_open {
            self.evaluate().await;
        }
    }

    /// Bring the subscription in line with the viewer.
    async fn evaluate(&mut self) {
        match self.viewer.clone() {
            SessionState::Resolving => {
                self.unsubscribe();
                self.feed.clear();
                self.status = PanelStatus::CheckingLogin;
            }
            SessionState::SignedOut => {
                self.unsubscribe();
                self.feed
                    .show_only(ChatMessage::local_bot(PROMPT_MESSAGE_ID, ANONYMOUS_PROMPT));
                self.status = PanelStatus::LoginPrompt;
            }
            SessionState::SignedIn(identity) => {
                // Same participant: keep the subscription, or stay
                // disconnected until reopened.
                if self.subscribed_as.as_deref() == Some(identity.id.as_str()) {
                    return;
                }

                self.unsubscribe();
                self.feed.clear();
                self.subscribed_as = Some(identity.id.clone());

                match self
                    .store
                    .subscribe_tail(&self.config.room, self.config.window_size)
                    .await
                {
                    Ok(subscription) => {
                        info!(room = %self.config.room, participant = %identity.id, "Subscribed to chat");
                        self.subscription = Some(subscription);
                        self.status = PanelStatus::Live;
                    }
                    Err(e) => {
                        warn!(room = %self.config.room, error = %e, "Chat subscribe failed");
                        self.status = PanelStatus::Disconnected;
                        self.raise(&ChatError::SubscriptionError(e.to_string()));
                    }
                }
            }
        }
    }

    fn unsubscribe(&mut self) {
        if self.subscription.take().is_some() {
            debug!(room = %self.config.room, "Dropped chat subscription");
        }
        self.subscribed_as = None;
    }

    fn raise(&mut self, error: &ChatError) {
        if self
            .notices
            .push(error, self.config.max_message_length)
            .is_some()
        {
            debug!(code = error.code(), "Raised chat notice");
        }
    }

    /// Whether the panel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// What the panel is showing.
    pub fn status(&self) -> PanelStatus {
        self.status
    }

    /// Whether a subscription is active.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        self.viewer.identity().is_some()
    }

    /// Session state the panel last observed.
    pub fn viewer(&self) -> &SessionState {
        &self.viewer
    }

    /// The session provider.
    pub fn session(&self) -> &P {
        &self.session
    }

    /// The live feed.
    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    /// Feed entries with their presentation for the current viewer.
    pub fn presentations(&self) -> impl Iterator<Item = (&ChatMessage, Presentation)> + '_ {
        self.feed
            .messages()
            .iter()
            .map(move |m| (m, resolve(m, &self.viewer)))
    }

    /// The input box.
    pub fn input_buffer(&self) -> &InputBuffer {
        &self.input
    }

    /// Whole seconds until the viewer may send again.
    pub fn cooldown_remaining(&self) -> u64 {
        match self.viewer.participant_id() {
            Some(id) => self.limiter.check_at(id, Instant::now()).seconds_remaining(),
            None => 0,
        }
    }

    /// Pending notices, oldest first.
    pub fn notices(&self) -> &[Notice] {
        self.notices.pending()
    }

    /// Dismiss a notice.
    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    /// Room rules.
    pub fn rules(&self) -> &'static [&'static str] {
        &CHAT_RULES
    }

    /// Panel configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}
