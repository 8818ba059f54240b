//! In-process identity provider.
//!
//! Accounts live in a `HashMap` keyed by lowercase email. Used by the test
//! suites; behaves like the Firebase client for everything the session gate
//! observes (notifications, registration auto sign-in, weak passwords).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;

use storedesk_core::{Email, PrincipalId};

use super::{AuthStatePublisher, AuthStateReceiver, IdentityError, IdentityProvider, Principal};

/// Minimum password length, matching the Firebase default policy.
const MIN_PASSWORD_LENGTH: usize = 6;

struct Account {
    uid: PrincipalId,
    email: Email,
    password: String,
}

/// In-memory identity provider.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    state: AuthStatePublisher,
    sign_outs: AtomicUsize,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    /// Create a provider with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            state: AuthStatePublisher::new(),
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Add an account with a fixed uid.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address; seed data is expected to be.
    #[must_use]
    pub fn with_account(self, uid: &str, email: &str, password: &str) -> Self {
        let email = Email::parse(email).expect("seed account email must be valid");
        self.accounts().insert(
            email.as_str().to_lowercase(),
            Account {
                uid: PrincipalId::new(uid),
                email,
                password: password.to_string(),
            },
        );
        self
    }

    /// Whether a principal is currently signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current_principal().is_some()
    }

    /// Number of times `sign_out` has been called.
    #[must_use]
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        let principal = {
            let accounts = self.accounts();
            let account = accounts
                .get(&email.as_str().to_lowercase())
                .filter(|account| account.password == password)
                .ok_or(IdentityError::InvalidCredentials)?;
            Principal {
                uid: account.uid.clone(),
                email: Some(account.email.clone()),
            }
        };

        self.state.publish(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.state.publish(None);
    }

    async fn register(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let principal = {
            let mut accounts = self.accounts();
            let key = email.as_str().to_lowercase();
            if accounts.contains_key(&key) {
                return Err(IdentityError::EmailExists);
            }
            let uid = PrincipalId::new(uuid::Uuid::new_v4().simple().to_string());
            accounts.insert(
                key,
                Account {
                    uid: uid.clone(),
                    email: email.clone(),
                    password: password.to_string(),
                },
            );
            Principal {
                uid,
                email: Some(email.clone()),
            }
        };

        self.state.publish(Some(principal.clone()));
        Ok(principal)
    }

    fn subscribe(&self) -> AuthStateReceiver {
        self.state.subscribe()
    }

    async fn id_token(&self) -> Result<Option<SecretString>, IdentityError> {
        Ok(self
            .current_principal()
            .map(|p| SecretString::from(format!("memory-token-{}", p.uid))))
    }
}
