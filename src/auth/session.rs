//! Tracks the signed-in identity of one session and decides whether a
//! protected page may be shown.
//!
//! The state starts out as loading with no identity. The first update comes
//! from looking up the session's identity; every later update comes from an
//! [IdentityEvent] about that identity.

use tokio::sync::{broadcast::error::RecvError, watch};

use crate::{
    Error,
    identity::{Identity, IdentityEvent, IdentityId, IdentityProvider},
};

/// The signed-in identity of a session, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    /// Set until the first notification has been received.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// The outcome of checking a session before showing protected content.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// Nothing may be rendered yet.
    Loading,
    RedirectToLogIn,
    Allow(Identity),
}

/// Decide whether protected content may be shown for `state`.
pub fn guard(state: &AuthState) -> Guard {
    match state {
        AuthState { loading: true, .. } => Guard::Loading,
        AuthState {
            identity: Some(identity),
            ..
        } => Guard::Allow(identity.clone()),
        AuthState { identity: None, .. } => Guard::RedirectToLogIn,
    }
}

/// Publishes the [AuthState] of one session.
///
/// The observer holds a single subscription to the provider's identity events.
/// The background task that feeds it stops once the observer is dropped.
#[derive(Debug)]
pub struct AuthStateObserver {
    receiver: watch::Receiver<AuthState>,
}

impl AuthStateObserver {
    /// Start observing the identity `session_identity`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(provider: &IdentityProvider, session_identity: IdentityId) -> Self {
        let (sender, receiver) = watch::channel(AuthState::default());
        // Subscribe before the first look up so that no event is missed in between.
        let mut events = provider.subscribe();
        let provider = provider.clone();

        tokio::spawn(async move {
            sender.send_replace(look_up(&provider, &session_identity));

            loop {
                tokio::select! {
                    _ = sender.closed() => break,
                    event = events.recv() => match event {
                        Ok(event) if event.identity_id() == &session_identity => {
                            let identity = match event {
                                IdentityEvent::SignedIn(identity) => Some(identity),
                                IdentityEvent::SignedOut(_) | IdentityEvent::Deleted(_) => None,
                            };

                            sender.send_replace(AuthState {
                                identity,
                                loading: false,
                            });
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Auth state observer for {session_identity} skipped {skipped} events"
                            );
                            sender.send_replace(look_up(&provider, &session_identity));
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        Self { receiver }
    }

    /// The latest auth state.
    pub fn current(&self) -> AuthState {
        self.receiver.borrow().clone()
    }

    /// Wait for the first notification and return the state after it.
    pub async fn wait_until_loaded(&mut self) -> AuthState {
        match self.receiver.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => AuthState {
                identity: None,
                loading: false,
            },
        }
    }

    /// Wait until the auth state changes and return the new state.
    pub async fn changed(&mut self) -> AuthState {
        if self.receiver.changed().await.is_err() {
            return AuthState {
                identity: None,
                loading: false,
            };
        }

        self.receiver.borrow_and_update().clone()
    }
}

fn look_up(provider: &IdentityProvider, id: &IdentityId) -> AuthState {
    let identity = match provider.get_identity(id) {
        Ok(identity) => Some(identity),
        Err(Error::NotFound) => None,
        Err(error) => {
            tracing::error!("Could not look up identity {id}: {error}");
            None
        }
    };

    AuthState {
        identity,
        loading: false,
    }
}
