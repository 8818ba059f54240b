//! Identity provider boundary.
//!
//! The back-office never verifies credentials itself. An [`IdentityProvider`]
//! signs principals in and out and publishes every change of the signed-in
//! principal on a `watch` channel; the session gate subscribes to it.
//!
//! # Implementations
//!
//! - [`FirebaseAuth`] - Firebase Authentication REST API (email/password)
//! - [`MemoryIdentity`] - in-process accounts for tests and local runs

mod error;
pub mod firebase;
pub mod memory;

pub use error::IdentityError;
pub use firebase::FirebaseAuth;
pub use memory::MemoryIdentity;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use storedesk_core::{Email, PrincipalId};

/// A signed-in identity provider user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider-assigned user ID; keys the authorization record.
    pub uid: PrincipalId,
    /// Email address, if the provider returned one.
    pub email: Option<Email>,
}

/// A sign-in state notification.
///
/// `sequence` increases by one for every notification so subscribers can tell
/// whether they have processed the latest one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthEvent {
    /// Monotonic notification counter (0 is the initial state).
    pub sequence: u64,
    /// The signed-in principal, or `None` when signed out.
    pub principal: Option<Principal>,
}

/// Receiving half of an identity subscription.
pub type AuthStateReceiver = watch::Receiver<AuthEvent>;

/// Identity provider operations used by the back-office.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    ///
    /// On success the provider publishes a "signed in" notification.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Principal, IdentityError>;

    /// Sign out the current principal. Always succeeds locally.
    async fn sign_out(&self);

    /// Create a new account. The new account is signed in immediately.
    async fn register(&self, email: &Email, password: &str) -> Result<Principal, IdentityError>;

    /// Subscribe to sign-in state. The current state is visible immediately.
    fn subscribe(&self) -> AuthStateReceiver;

    /// ID token of the signed-in principal, for authorizing document store calls.
    async fn id_token(&self) -> Result<Option<SecretString>, IdentityError>;

    /// The currently signed-in principal.
    fn current_principal(&self) -> Option<Principal> {
        self.subscribe().borrow().principal.clone()
    }
}

/// Shared sender for sign-in state notifications.
pub(crate) struct AuthStatePublisher {
    tx: watch::Sender<AuthEvent>,
}

impl AuthStatePublisher {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthEvent::default());
        Self { tx }
    }

    pub(crate) fn publish(&self, principal: Option<Principal>) {
        self.tx.send_modify(|event| {
            event.sequence += 1;
            event.principal = principal;
        });
    }

    pub(crate) fn subscribe(&self) -> AuthStateReceiver {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_bumps_sequence() {
        let publisher = AuthStatePublisher::new();
        let rx = publisher.subscribe();
        assert_eq!(rx.borrow().sequence, 0);
        assert!(rx.borrow().principal.is_none());

        publisher.publish(Some(Principal {
            uid: PrincipalId::new("u1"),
            email: None,
        }));
        publisher.publish(None);

        let event = rx.borrow().clone();
        assert_eq!(event.sequence, 2);
        assert!(event.principal.is_none());
    }
}
