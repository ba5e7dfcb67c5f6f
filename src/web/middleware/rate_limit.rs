//! Gateway-side rate limiting.
//!
//! The panel's slow mode lives in each connection, so a participant with two
//! tabs open could double their rate. [`SendBackstop`] is shared by every
//! connection of a gateway and refuses appends that come too fast.
//! [`InboundLimiter`] caps raw frames per connection.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::time::Instant;

use crate::chat::{ChatMessage, NewChatMessage};
use crate::rate_limit::ActionRateLimiter;
use crate::store::{MessageStore, StoreError, StoreResult, Subscription};

/// Tolerance between the panel's cooldown check and the actual write.
const BACKSTOP_SLACK: Duration = Duration::from_millis(250);

/// Minimum period accepted by the backstop.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Default cap on client frames per connection per second.
pub const DEFAULT_FRAMES_PER_SECOND: u32 = 20;

#[derive(Debug)]
struct BackstopState {
    sent: ActionRateLimiter,
    in_flight: HashSet<String>,
}

/// Shared per-participant send limiter.
///
/// Only successful writes count against a participant. While one of their
/// writes is in progress, other writes for the same participant are refused.
#[derive(Debug)]
pub struct SendBackstop {
    state: Mutex<BackstopState>,
    period: Duration,
}

impl SendBackstop {
    /// Allow one send per `cooldown` per participant, less a small slack.
    pub fn new(cooldown: Duration) -> Self {
        let period = cooldown.saturating_sub(BACKSTOP_SLACK).max(MIN_PERIOD);
        Self {
            state: Mutex::new(BackstopState {
                sent: ActionRateLimiter::new(period),
                in_flight: HashSet::new(),
            }),
            period,
        }
    }

    /// Period enforced between two sends.
    pub fn period(&self) -> Duration {
        self.period
    }

    fn lock(&self) -> MutexGuard<'_, BackstopState> {
        // Poisoning is ignored.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve a send for a participant.
    ///
    /// Returns the whole seconds to wait when the participant is cooling
    /// down or already has a send in progress.
    pub fn acquire(&self, participant_id: &str) -> Result<SendPermit<'_>, u64> {
        let mut state = self.lock();
        if state.in_flight.contains(participant_id) {
            return Err(self.period.as_millis().div_ceil(1000) as u64);
        }
        let verdict = state.sent.check_at(participant_id, Instant::now());
        if !verdict.is_allowed() {
            return Err(verdict.seconds_remaining());
        }
        state.in_flight.insert(participant_id.to_string());
        Ok(SendPermit {
            backstop: self,
            participant_id: participant_id.to_string(),
        })
    }

    /// Number of participants still cooling down.
    pub fn tracked(&self) -> usize {
        self.lock().sent.len()
    }

    /// Cleanup old entries (call periodically).
    pub fn cleanup(&self) {
        self.lock().sent.prune_at(Instant::now());
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

/// A reserved send. Dropping it without [`succeeded`](Self::succeeded)
/// releases the reservation without starting a cooldown.
#[derive(Debug)]
pub struct SendPermit<'a> {
    backstop: &'a SendBackstop,
    participant_id: String,
}

impl SendPermit<'_> {
    /// Start the participant's cooldown.
    pub fn succeeded(self) {
        self.backstop
            .lock()
            .sent
            .record_at(&self.participant_id, Instant::now());
    }
}

impl Drop for SendPermit<'_> {
    fn drop(&mut self) {
        self.backstop.lock().in_flight.remove(&self.participant_id);
    }
}

/// A store whose appends pass through the [`SendBackstop`].
#[derive(Debug, Clone)]
pub struct GuardedStore<S> {
    inner: S,
    backstop: Arc<SendBackstop>,
}

impl<S> GuardedStore<S> {
    /// Wrap a store.
    pub fn new(inner: S, backstop: Arc<SendBackstop>) -> Self {
        Self { inner, backstop }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: MessageStore> MessageStore for GuardedStore<S> {
    async fn subscribe_tail(&self, room: &str, limit: usize) -> StoreResult<Subscription> {
        self.inner.subscribe_tail(room, limit).await
    }

    async fn append(&self, room: &str, message: NewChatMessage) -> StoreResult<ChatMessage> {
        let permit = match self.backstop.acquire(&message.sender_id) {
            Ok(permit) => permit,
            Err(seconds_remaining) => {
                tracing::warn!(participant = %message.sender_id, "Send backstop exceeded");
                return Err(StoreError::Throttled { seconds_remaining });
            }
        };
        let stored = self.inner.append(room, message).await?;
        permit.succeeded();
        Ok(stored)
    }
}

/// Per-connection cap on inbound client frames.
pub struct InboundLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl InboundLimiter {
    /// Allow `per_second` frames per second with an equal burst.
    pub fn new(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    /// Check and consume one frame.
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for InboundLimiter {
    fn default() -> Self {
        Self::new(NonZeroU32::new(DEFAULT_FRAMES_PER_SECOND).unwrap_or(NonZeroU32::MIN))
    }
}

impl std::fmt::Debug for InboundLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundLimiter").finish_non_exhaustive()
    }
}
