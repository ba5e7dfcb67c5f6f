//! In-process identity provider.

use tokio::sync::watch;
use tracing::{debug, info};

use super::{Identity, SessionError, SessionObserver, SessionState};

/// Identity provider holding one session in a `watch` channel.
///
/// Starts in [`SessionState::Resolving`] until the first sign-in or
/// sign-out is reported.
#[derive(Debug)]
pub struct LocalSession {
    state: watch::Sender<SessionState>,
}

impl LocalSession {
    /// Create a provider that is still resolving.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Resolving);
        Self { state }
    }

    /// Create a provider that is already signed out.
    pub fn signed_out() -> Self {
        let session = Self::new();
        session.sign_out();
        session
    }

    /// Create a provider with a signed-in participant.
    pub fn signed_in(identity: Identity) -> Self {
        let session = Self::new();
        session.sign_in(identity);
        session
    }

    /// Report a sign-in.
    pub fn sign_in(&self, identity: Identity) {
        info!("Participant {} signed in", identity.id);
        self.state.send_replace(SessionState::SignedIn(identity));
    }

    /// Report a sign-out.
    pub fn sign_out(&self) {
        if let Some(id) = self.state.borrow().participant_id() {
            info!("Participant {} signed out", id);
        }
        self.state.send_replace(SessionState::SignedOut);
    }

    /// Change the display name of the signed-in participant.
    pub fn update_display_name(
        &self,
        user_id: &str,
        display_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let display_name = display_name.into();
        self.modify(user_id, |identity| identity.display_name = display_name)
    }

    /// Change the avatar of the signed-in participant.
    pub fn update_avatar(
        &self,
        user_id: &str,
        avatar_url: impl Into<String>,
    ) -> Result<(), SessionError> {
        let avatar_url = avatar_url.into();
        self.modify(user_id, |identity| identity.avatar_url = Some(avatar_url))
    }

    fn modify(
        &self,
        user_id: &str,
        change: impl FnOnce(&mut Identity),
    ) -> Result<(), SessionError> {
        let mut result = Err(SessionError::NotSignedIn);
        self.state.send_if_modified(|state| match state {
            SessionState::SignedIn(identity) if identity.id == user_id => {
                change(identity);
                result = Ok(());
                true
            }
            SessionState::SignedIn(_) => {
                result = Err(SessionError::IdMismatch);
                false
            }
            _ => false,
        });
        if result.is_ok() {
            debug!("Profile of {} updated", user_id);
        }
        result
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionObserver for LocalSession {
    fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_resolving() {
        let session = LocalSession::new();
        assert!(session.current().is_resolving());
    }

    #[test]
    fn test_sign_in_and_out() {
        let session = LocalSession::new();
        session.sign_in(Identity::new("u1", "Ann"));
        assert_eq!(session.current().participant_id(), Some("u1"));

        session.sign_out();
        assert_eq!(session.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_watch_notifies_transitions() {
        let session = LocalSession::signed_out();
        let mut rx = session.watch();

        session.sign_in(Identity::new("u1", "Ann"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().participant_id(), Some("u1"));
    }

    #[test]
    fn test_update_display_name() {
        let session = LocalSession::signed_in(Identity::new("u1", "Ann"));
        session.update_display_name("u1", "Annie").unwrap();

        let state = session.current();
        assert_eq!(state.identity().unwrap().display_name, "Annie");
    }

    #[test]
    fn test_update_avatar() {
        let session = LocalSession::signed_in(Identity::new("u1", "Ann"));
        session.update_avatar("u1", "https://cdn.example/new.png").unwrap();

        let state = session.current();
        assert_eq!(
            state.identity().unwrap().avatar_url.as_deref(),
            Some("https://cdn.example/new.png")
        );
    }

    #[test]
    fn test_update_rejects_other_participant() {
        let session = LocalSession::signed_in(Identity::new("u1", "Ann"));
        assert_eq!(
            session.update_display_name("u2", "Bob"),
            Err(SessionError::IdMismatch)
        );
        assert_eq!(
            session.current().identity().unwrap().display_name,
            "Ann"
        );
    }

    #[test]
    fn test_update_requires_sign_in() {
        let session = LocalSession::signed_out();
        assert_eq!(
            session.update_avatar("u1", "https://cdn.example/x.png"),
            Err(SessionError::NotSignedIn)
        );
    }

    #[tokio::test]
    async fn test_profile_change_notifies_watchers() {
        let session = LocalSession::signed_in(Identity::new("u1", "Ann"));
        let mut rx = session.watch();
        rx.borrow_and_update();

        session.update_avatar("u1", "https://cdn.example/a.png").unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
