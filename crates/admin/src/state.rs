//! Application state shared across handlers.

use std::sync::Arc;

use crate::gate::SessionGate;
use crate::identity::IdentityProvider;
use crate::store::DocumentStore;

/// Application state shared across all handlers.
///
/// Cheap to clone; all clones share the same gate and document store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    gate: SessionGate,
    store: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Build state around an already started gate.
    #[must_use]
    pub fn new(gate: SessionGate, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { gate, store }),
        }
    }

    /// Start the session gate for `identity` and build state around it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let gate = SessionGate::start(identity, Arc::clone(&store));
        Self::new(gate, store)
    }

    /// The process-wide session gate.
    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    /// The document store, for opening resource views.
    #[must_use]
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.inner.store)
    }

    /// Stop the session gate.
    pub fn shutdown(&self) {
        self.inner.gate.shutdown();
    }
}
