//! Session gate.
//!
//! Decides, for the lifetime of the process, whether the principal signed in
//! to the identity provider is a store admin and for which store. Everything
//! that touches store data goes through [`SessionGate::access`].
//!
//! # Evaluation
//!
//! A background task follows the identity provider's sign-in notifications.
//! For each "signed in" notification it reads `users/{uid}`:
//!
//! - `STORE_ADMIN` with a store ID: access is granted for that store
//! - anything else (no record, other role, no store, failed read): the
//!   principal is signed out at the provider and the gate resets
//!
//! Results are published on a `watch` channel as whole [`GateState`] values.
//! A notification that has been overtaken by a newer one never signs out or
//! grants access to the newer principal.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use storedesk_core::{Email, StoreId};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::identity::{AuthEvent, AuthStateReceiver, IdentityError, IdentityProvider, Principal};
use crate::models::AuthorizationRecord;
use crate::store::{Collection, DocumentStore, StoreError};

// =============================================================================
// State
// =============================================================================

/// Published gate state. Replaced wholesale on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateState {
    /// The authorised principal; `None` unless access is granted.
    pub principal: Option<Principal>,
    /// Whether the principal is a store admin.
    pub is_admin: bool,
    /// The store the principal administers.
    pub store_id: Option<StoreId>,
    /// True until the first notification has been evaluated.
    pub loading: bool,
    processed: u64,
    grant: u64,
}

impl GateState {
    const fn initial() -> Self {
        Self {
            principal: None,
            is_admin: false,
            store_id: None,
            loading: true,
            processed: 0,
            grant: 0,
        }
    }

    const fn signed_out(processed: u64) -> Self {
        Self {
            principal: None,
            is_admin: false,
            store_id: None,
            loading: false,
            processed,
            grant: 0,
        }
    }

    const fn granted(principal: Principal, store_id: StoreId, processed: u64) -> Self {
        Self {
            principal: Some(principal),
            is_admin: true,
            store_id: Some(store_id),
            loading: false,
            processed,
            grant: processed,
        }
    }

    /// Sequence number of the last identity notification evaluated.
    #[must_use]
    pub const fn processed_sequence(&self) -> u64 {
        self.processed
    }

    /// The capability check every view and route uses.
    #[must_use]
    pub fn access(&self) -> Access {
        if self.loading {
            return Access::Loading;
        }
        match (&self.principal, &self.store_id) {
            (Some(principal), Some(store_id)) if self.is_admin => Access::Granted(StoreAdmin {
                principal: principal.clone(),
                store_id: store_id.clone(),
                grant: self.grant,
            }),
            _ => Access::Denied,
        }
    }
}

// =============================================================================
// Capability
// =============================================================================

/// Proof that a principal is an admin of a store.
///
/// Only the gate can construct one; resource views require it to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAdmin {
    principal: Principal,
    store_id: StoreId,
    grant: u64,
}

impl StoreAdmin {
    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub const fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    #[must_use]
    pub const fn email(&self) -> Option<&Email> {
        self.principal.email.as_ref()
    }

    /// Sequence number of the sign-in notification that granted access.
    ///
    /// Differs for every sign-in, so it identifies one grant.
    #[must_use]
    pub const fn grant_sequence(&self) -> u64 {
        self.grant
    }
}

#[cfg(test)]
impl StoreAdmin {
    pub(crate) fn for_tests(uid: &str, store_id: &str) -> Self {
        Self {
            principal: Principal {
                uid: storedesk_core::PrincipalId::new(uid),
                email: None,
            },
            store_id: StoreId::new(store_id),
            grant: 1,
        }
    }
}

/// Outcome of the capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The gate has not evaluated the first notification yet.
    Loading,
    /// Nobody is signed in, or the principal is not a store admin.
    Denied,
    /// A store admin is signed in.
    Granted(StoreAdmin),
}

impl Access {
    /// The capability, if granted.
    #[must_use]
    pub fn granted(self) -> Option<StoreAdmin> {
        match self {
            Self::Granted(admin) => Some(admin),
            Self::Loading | Self::Denied => None,
        }
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Process-wide session gate.
///
/// Cheap to clone; all clones observe the same background task.
#[derive(Clone)]
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    state: watch::Receiver<GateState>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionGate {
    /// Subscribe to the identity provider and start evaluating notifications.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let (tx, rx) = watch::channel(GateState::initial());
        let events = identity.subscribe();
        tracing::info!(backend = store.backend_name(), "Starting session gate");

        let evaluator = Evaluator {
            identity: Arc::clone(&identity),
            store,
            state: tx,
        };
        let task = tokio::spawn(evaluator.run(events));

        Self {
            identity,
            state: rx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Stop following the identity provider. The last state stays readable.
    pub fn shutdown(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Session gate stopped");
        }
    }

    /// Whether the background task is still following the provider.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Sign in at the identity provider.
    ///
    /// Returns once the gate has evaluated the resulting notification, so the
    /// caller observes the settled access decision.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; nothing is retried.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        let principal = self.identity.sign_in(email, password).await?;
        self.await_latest_event().await;
        Ok(principal)
    }

    /// Sign out at the identity provider and wait for the gate to reset.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
        self.await_latest_event().await;
    }

    /// Create an identity provider account.
    ///
    /// The new account has no authorization record, so the gate signs it out
    /// again; access has to be provisioned separately.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        let principal = self.identity.register(email, password).await?;
        self.await_latest_event().await;
        Ok(principal)
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> GateState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state.clone()
    }

    /// Current capability check.
    #[must_use]
    pub fn access(&self) -> Access {
        self.state.borrow().access()
    }

    /// Wait until the first notification has been evaluated.
    pub async fn settled(&self) -> GateState {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(|state| !state.loading).await.map(|state| state.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    async fn await_latest_event(&self) {
        let target = self.identity.subscribe().borrow().sequence;
        let mut rx = self.state.clone();
        if rx.wait_for(|state| state.processed >= target).await.is_err() {
            tracing::warn!(sequence = target, "Session gate stopped before evaluating sign-in state");
        }
    }
}

/// Background half of the gate: owns the state sender.
struct Evaluator {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    state: watch::Sender<GateState>,
}

impl Evaluator {
    async fn run(self, mut events: AuthStateReceiver) {
        loop {
            let event = events.borrow_and_update().clone();
            self.evaluate(event).await;
            if events.changed().await.is_err() {
                tracing::debug!("Identity provider closed, stopping session gate");
                break;
            }
        }
    }

    #[instrument(skip(self, event), fields(sequence = event.sequence))]
    async fn evaluate(&self, event: AuthEvent) {
        let Some(principal) = event.principal else {
            self.reset(event.sequence);
            return;
        };

        match self.lookup(&principal).await {
            Ok(Some(store_id)) => {
                if !self.is_current(&principal) {
                    self.skip_stale(event.sequence);
                    return;
                }
                tracing::info!(uid = %principal.uid, store_id = %store_id, "Store admin access granted");
                set_sentry_user(
                    principal.uid.as_str(),
                    principal.email.as_ref().map(Email::as_str),
                );
                self.state
                    .send_replace(GateState::granted(principal, store_id, event.sequence));
            }
            Ok(None) => {
                tracing::info!(uid = %principal.uid, "Principal is not a store admin, signing out");
                self.reject(&principal, event.sequence).await;
            }
            Err(e) => {
                tracing::error!(uid = %principal.uid, error = %e, "Authorization lookup failed, signing out");
                self.reject(&principal, event.sequence).await;
            }
        }
    }

    /// Resolve the store a principal administers, if any.
    async fn lookup(&self, principal: &Principal) -> Result<Option<StoreId>, StoreError> {
        let Some(doc) = self
            .store
            .get(Collection::Users, principal.uid.as_str())
            .await?
        else {
            tracing::debug!(uid = %principal.uid, "No authorization record");
            return Ok(None);
        };

        match doc.decode::<AuthorizationRecord>() {
            Ok(record) => Ok(record.grants()),
            Err(e) => {
                tracing::warn!(uid = %principal.uid, error = %e, "Malformed authorization record");
                Ok(None)
            }
        }
    }

    async fn reject(&self, principal: &Principal, sequence: u64) {
        if !self.is_current(principal) {
            self.skip_stale(sequence);
            return;
        }
        self.identity.sign_out().await;
        self.reset(sequence);
    }

    fn reset(&self, sequence: u64) {
        clear_sentry_user();
        self.state.send_replace(GateState::signed_out(sequence));
    }

    /// Mark a superseded notification as processed without acting on it.
    fn skip_stale(&self, sequence: u64) {
        tracing::debug!(sequence, "Skipping superseded sign-in notification");
        self.state.send_modify(|state| {
            state.processed = state.processed.max(sequence);
            state.loading = false;
        });
    }

    fn is_current(&self, principal: &Principal) -> bool {
        self.identity
            .current_principal()
            .is_some_and(|current| current.uid == principal.uid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use storedesk_core::PrincipalId;

    use super::*;
    use crate::identity::MemoryIdentity;
    use crate::store::MemoryStore;

    const PASSWORD: &str = "hunter22";

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn identity() -> Arc<MemoryIdentity> {
        Arc::new(
            MemoryIdentity::new()
                .with_account("admin-1", "admin@store.example", PASSWORD)
                .with_account("customer-1", "customer@store.example", PASSWORD)
                .with_account("nostore-1", "nostore@store.example", PASSWORD)
                .with_account("ghost-1", "ghost@store.example", PASSWORD),
        )
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_document(
                    Collection::Users,
                    "admin-1",
                    json!({"role": "STORE_ADMIN", "storeId": "store-1"}),
                )
                .with_document(
                    Collection::Users,
                    "customer-1",
                    json!({"role": "CUSTOMER", "storeId": "store-1"}),
                )
                .with_document(
                    Collection::Users,
                    "nostore-1",
                    json!({"role": "STORE_ADMIN"}),
                ),
        )
    }

    async fn started(identity: &Arc<MemoryIdentity>, store: &Arc<MemoryStore>) -> SessionGate {
        let gate = SessionGate::start(identity.clone(), store.clone());
        gate.settled().await;
        gate
    }

    fn assert_reset(state: &GateState) {
        assert!(state.principal.is_none());
        assert!(!state.is_admin);
        assert!(state.store_id.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_settles_signed_out() {
        let gate = started(&identity(), &store()).await;
        assert_reset(&gate.snapshot());
        assert_eq!(gate.access(), Access::Denied);
    }

    #[tokio::test]
    async fn test_store_admin_is_granted() {
        let identity = identity();
        let gate = started(&identity, &store()).await;

        gate.sign_in(&email("admin@store.example"), PASSWORD)
            .await
            .unwrap();

        let state = gate.snapshot();
        assert!(state.is_admin);
        assert_eq!(state.store_id, Some(StoreId::new("store-1")));
        let admin = gate.access().granted().unwrap();
        assert_eq!(admin.store_id().as_str(), "store-1");
        assert_eq!(admin.principal().uid.as_str(), "admin-1");
        assert_eq!(identity.sign_out_count(), 0);
    }

    #[tokio::test]
    async fn test_each_sign_in_is_a_new_grant() {
        let identity = identity();
        let gate = started(&identity, &store()).await;
        let admin = email("admin@store.example");

        gate.sign_in(&admin, PASSWORD).await.unwrap();
        let first = gate.access().granted().unwrap().grant_sequence();
        gate.sign_out().await;
        gate.sign_in(&admin, PASSWORD).await.unwrap();
        let second = gate.access().granted().unwrap().grant_sequence();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_rejected_principals_are_signed_out() {
        for account in [
            "customer@store.example",
            "nostore@store.example",
            "ghost@store.example",
        ] {
            let identity = identity();
            let gate = started(&identity, &store()).await;

            gate.sign_in(&email(account), PASSWORD).await.unwrap();

            assert_reset(&gate.snapshot());
            assert_eq!(gate.access(), Access::Denied, "{account}");
            assert!(!identity.is_signed_in(), "{account}");
            assert_eq!(identity.sign_out_count(), 1, "{account}");
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let identity = identity();
        let store = store();
        let gate = started(&identity, &store).await;
        store.set_fail_reads(true);

        gate.sign_in(&email("admin@store.example"), PASSWORD)
            .await
            .unwrap();

        assert_reset(&gate.snapshot());
        assert!(!identity.is_signed_in());
    }

    #[tokio::test]
    async fn test_registration_never_grants_access() {
        let identity = identity();
        let gate = started(&identity, &store()).await;

        gate.register(&email("new@store.example"), "s3cret!")
            .await
            .unwrap();

        assert_eq!(gate.access(), Access::Denied);
        assert!(!identity.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_out_resets() {
        let gate = started(&identity(), &store()).await;
        gate.sign_in(&email("admin@store.example"), PASSWORD)
            .await
            .unwrap();

        gate.sign_out().await;

        assert_reset(&gate.snapshot());
    }

    #[tokio::test]
    async fn test_authentication_errors_pass_through() {
        let gate = started(&identity(), &store()).await;
        let result = gate.sign_in(&email("admin@store.example"), "wrong").await;

        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
        assert_eq!(gate.access(), Access::Denied);
    }

    #[tokio::test]
    async fn test_stale_notification_does_not_touch_newer_principal() {
        let identity = identity();
        let (tx, rx) = watch::channel(GateState::initial());
        let evaluator = Evaluator {
            identity: identity.clone(),
            store: store(),
            state: tx,
        };

        // The admin is the provider's current principal when an older
        // notification for a customer is evaluated
        identity
            .sign_in(&email("admin@store.example"), PASSWORD)
            .await
            .unwrap();
        evaluator
            .evaluate(AuthEvent {
                sequence: 1,
                principal: Some(Principal {
                    uid: PrincipalId::new("customer-1"),
                    email: None,
                }),
            })
            .await;
        assert!(identity.is_signed_in());
        assert_eq!(identity.sign_out_count(), 0);

        // A customer replaces the admin before the admin's notification is evaluated
        identity
            .sign_in(&email("customer@store.example"), PASSWORD)
            .await
            .unwrap();
        evaluator
            .evaluate(AuthEvent {
                sequence: 1,
                principal: Some(Principal {
                    uid: PrincipalId::new("admin-1"),
                    email: None,
                }),
            })
            .await;

        let state = rx.borrow().clone();
        assert!(!state.is_admin);
        assert!(state.store_id.is_none());
        assert!(!state.loading);
        assert_eq!(state.processed_sequence(), 1);
    }

    #[tokio::test]
    async fn test_watch_observes_grant() {
        let gate = started(&identity(), &store()).await;
        let mut rx = gate.watch();

        gate.sign_in(&email("admin@store.example"), PASSWORD)
            .await
            .unwrap();

        let state = rx.wait_for(|state| state.is_admin).await.unwrap().clone();
        assert_eq!(state.store_id, Some(StoreId::new("store-1")));
    }

    #[tokio::test]
    async fn test_shutdown_stops_evaluation() {
        let identity = identity();
        let gate = started(&identity, &store()).await;
        assert!(gate.is_running());

        gate.shutdown();
        assert!(!gate.is_running());

        let signed_in = tokio::time::timeout(
            Duration::from_secs(5),
            gate.sign_in(&email("admin@store.example"), PASSWORD),
        )
        .await
        .unwrap();
        assert!(signed_in.is_ok());
        assert_eq!(gate.access(), Access::Denied);
    }
}
