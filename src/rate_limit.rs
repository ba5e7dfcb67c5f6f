//! Per-participant send rate limiting ("slow mode").
//!
//! The limiter is owned by a single chat panel and is advisory only: it is
//! not shared between tabs or devices. The gateway adds a shared backstop
//! in [`crate::web::SendBackstop`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Default slow mode: one message every 5 seconds.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed.
    Allowed,
    /// Action is denied due to rate limit.
    Denied {
        /// Time until the next action is allowed.
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// Check if the action is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }

    /// Whole seconds to wait, rounded up. Zero when allowed.
    pub fn seconds_remaining(&self) -> u64 {
        match self {
            RateLimitResult::Allowed => 0,
            RateLimitResult::Denied { retry_after } => {
                retry_after.as_millis().div_ceil(1000) as u64
            }
        }
    }
}

/// Cooldown limiter keyed by participant ID.
///
/// Remembers the last accepted action of every participant for as long as
/// it is inside the cooldown window.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gamblr_chat::rate_limit::ActionRateLimiter;
/// use tokio::time::Instant;
///
/// let mut limiter = ActionRateLimiter::new(Duration::from_secs(5));
/// let now = Instant::now();
///
/// assert!(limiter.check_at("u1", now).is_allowed());
/// limiter.record_at("u1", now);
/// assert!(!limiter.check_at("u1", now).is_allowed());
/// ```
#[derive(Debug)]
pub struct ActionRateLimiter {
    cooldown: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl ActionRateLimiter {
    /// Create a limiter allowing one action per `cooldown`.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: HashMap::new(),
        }
    }

    /// The cooldown in use.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check if a participant may act at `now`.
    ///
    /// This does not record the action; call [`record_at`](Self::record_at)
    /// once the action has succeeded.
    pub fn check_at(&self, participant_id: &str, now: Instant) -> RateLimitResult {
        match self.last_accepted.get(participant_id) {
            Some(&last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.cooldown {
                    RateLimitResult::Denied {
                        retry_after: self.cooldown - elapsed,
                    }
                } else {
                    RateLimitResult::Allowed
                }
            }
            None => RateLimitResult::Allowed,
        }
    }

    /// Record an accepted action performed at `at`.
    pub fn record_at(&mut self, participant_id: &str, at: Instant) {
        self.prune_at(at);
        self.last_accepted.insert(participant_id.to_string(), at);
    }

    /// Forget participants whose cooldown has expired at `now`.
    pub fn prune_at(&mut self, now: Instant) {
        let cooldown = self.cooldown;
        self.last_accepted
            .retain(|_, &mut last| now.saturating_duration_since(last) < cooldown);
    }

    /// Number of participants still cooling down.
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    /// Whether no participant is cooling down.
    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}

impl Default for ActionRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
