//! Chat errors and the transient notices they are shown as.

use serde::Serialize;
use thiserror::Error;

use super::sanitize::ValidationReason;

/// Everything that can go wrong while using the chat panel.
///
/// None of these are fatal; the panel turns each into a [`Notice`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Chat was used while signed out.
    #[error("not authenticated")]
    NotAuthenticated,
    /// The identity provider has not reported yet.
    #[error("session is still resolving")]
    SessionResolving,
    /// The message was empty or too long.
    #[error("validation failed: {}", .reason.as_str())]
    ValidationFailed {
        /// Why validation failed.
        reason: ValidationReason,
    },
    /// A send was attempted inside the cooldown window.
    #[error("rate limited for {seconds_remaining}s")]
    RateLimited {
        /// Whole seconds until the next send is allowed.
        seconds_remaining: u64,
    },
    /// The live feed could not be established or was interrupted.
    #[error("subscription error: {0}")]
    SubscriptionError(String),
    /// The store rejected the write.
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),
}

impl ChatError {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotAuthenticated => "not_authenticated",
            ChatError::SessionResolving => "session_resolving",
            ChatError::ValidationFailed { .. } => "validation_failed",
            ChatError::RateLimited { .. } => "rate_limited",
            ChatError::SubscriptionError(_) => "subscription_error",
            ChatError::StoreWriteFailed(_) => "store_write_failed",
        }
    }

    /// The notice shown for this error, if any.
    ///
    /// Empty messages are rejected silently.
    pub fn to_notice(&self, max_length: usize) -> Option<(NoticeSeverity, String, String)> {
        let (severity, title, description) = match self {
            ChatError::NotAuthenticated => (
                NoticeSeverity::Error,
                "Login Required".to_string(),
                "Please log in to send messages.".to_string(),
            ),
            ChatError::SessionResolving => (
                NoticeSeverity::Info,
                "Loading...".to_string(),
                "Please wait while we check your login status.".to_string(),
            ),
            ChatError::ValidationFailed {
                reason: ValidationReason::Empty,
            } => return None,
            ChatError::ValidationFailed {
                reason: ValidationReason::TooLong,
            } => (
                NoticeSeverity::Error,
                "Character limit reached".to_string(),
                format!(
                    "Maximum {max_length} characters allowed. Your message is too long."
                ),
            ),
            ChatError::RateLimited { seconds_remaining } => (
                NoticeSeverity::Error,
                "Slow Mode Active".to_string(),
                format!(
                    "Please wait {seconds_remaining} second{} before sending another message.",
                    if *seconds_remaining == 1 { "" } else { "s" }
                ),
            ),
            ChatError::SubscriptionError(_) => (
                NoticeSeverity::Error,
                "Chat Disconnected".to_string(),
                "Live updates stopped. Reopen the chat to reconnect.".to_string(),
            ),
            ChatError::StoreWriteFailed(_) => (
                NoticeSeverity::Error,
                "Message Not Sent".to_string(),
                "Your message could not be delivered. Please try again.".to_string(),
            ),
        };
        Some((severity, title, description))
    }
}

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    /// Informational.
    Info,
    /// Something was rejected or failed.
    Error,
}

/// A transient, dismissable user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Panel-local ID used to dismiss the notice.
    pub id: u64,
    /// Code of the error that raised it.
    pub code: &'static str,
    /// Severity.
    pub severity: NoticeSeverity,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
}

/// Most notices kept pending; older ones are dropped first.
pub const MAX_PENDING_NOTICES: usize = 20;

/// Queue of notices waiting to be dismissed.
#[derive(Debug, Default)]
pub struct Notices {
    next_id: u64,
    /// Oldest first, at most [`MAX_PENDING_NOTICES`].
    pending: Vec<Notice>,
}

impl Notices {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the notice for an error. Returns the notice, if one was raised.
    pub fn push(&mut self, error: &ChatError, max_length: usize) -> Option<&Notice> {
        let (severity, title, description) = error.to_notice(max_length)?;
        self.next_id += 1;
        self.pending.push(Notice {
            id: self.next_id,
            code: error.code(),
            severity,
            title,
            description,
        });
        if self.pending.len() > MAX_PENDING_NOTICES {
            let excess = self.pending.len() - MAX_PENDING_NOTICES;
            self.pending.drain(..excess);
        }
        self.pending.last()
    }

    /// Dismiss a notice. Returns false if it was not pending.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|n| n.id != id);
        self.pending.len() != before
    }

    /// Pending notices, oldest first.
    pub fn pending(&self) -> &[Notice] {
        &self.pending
    }
}
