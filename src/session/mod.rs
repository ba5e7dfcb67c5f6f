//! Participant session observation.
//!
//! The chat panel never owns the participant's identity. It reads it through
//! a [`SessionObserver`], which exposes the current [`SessionState`] and a
//! `watch` receiver that fires on every sign-in, sign-out or profile change.

mod local;

pub use local::LocalSession;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Identity of a signed-in participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider-assigned participant ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Avatar image reference.
    pub avatar_url: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Whether the email address has been verified.
    pub email_verified: bool,
}

impl Identity {
    /// Create an identity with no avatar or email.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
            email: None,
            email_verified: false,
        }
    }

    /// Set the avatar URL.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Set the email address and its verification flag.
    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
        self.email = Some(email.into());
        self.email_verified = verified;
        self
    }
}

/// Session state as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The provider has not reported yet.
    #[default]
    Resolving,
    /// Nobody is signed in.
    SignedOut,
    /// A participant is signed in.
    SignedIn(Identity),
}

impl SessionState {
    /// The signed-in identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    /// The signed-in participant ID, if any.
    pub fn participant_id(&self) -> Option<&str> {
        self.identity().map(|i| i.id.as_str())
    }

    /// Whether the provider is still resolving.
    pub fn is_resolving(&self) -> bool {
        matches!(self, SessionState::Resolving)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Resolving => "resolving",
            SessionState::SignedOut => "signed_out",
            SessionState::SignedIn(_) => "signed_in",
        }
    }
}

/// Read access to a process-wide participant session.
pub trait SessionObserver: Send + Sync {
    /// Current session state.
    fn current(&self) -> SessionState;

    /// A receiver that is notified on every session transition.
    fn watch(&self) -> watch::Receiver<SessionState>;
}

impl<T: SessionObserver + ?Sized> SessionObserver for Arc<T> {
    fn current(&self) -> SessionState {
        (**self).current()
    }

    fn watch(&self) -> watch::Receiver<SessionState> {
        (**self).watch()
    }
}

/// Errors from identity provider actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No participant is signed in.
    #[error("user not authenticated")]
    NotSignedIn,
    /// The action targets a different participant than the signed-in one.
    #[error("user ID mismatch")]
    IdMismatch,
}
