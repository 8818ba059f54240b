//! Resource views.
//!
//! A [`ResourceView`] presents one store-scoped slice of the document store
//! (the store's products, its orders, or its configuration) and re-reads
//! that slice after every successful write, so what is presented always
//! matches the store.
//!
//! Views can only be opened with a [`StoreAdmin`] capability from the session
//! gate; the scope of every read and write is that capability's store.
//!
//! ```text
//! load ──► snapshot ──► mutate ──► write ──► refresh ──► snapshot
//!                                    │
//!                                    └─ failure: snapshot untouched,
//!                                       MutationError::Write (retryable)
//! ```

pub mod orders;
pub mod products;
pub mod store_config;

pub use orders::OrdersView;
pub use products::ProductsView;
pub use store_config::StoreConfigView;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use storedesk_core::StoreId;

use crate::gate::StoreAdmin;
use crate::models::ValidationError;
use crate::store::{Collection, Document, DocumentStore, StoreError};

/// Read of a store-scoped slice.
#[async_trait]
pub trait ScopedFetch: Send + Sync + 'static {
    /// What a view presents: a list, or a single optional document.
    type Snapshot: Clone + Default + fmt::Debug + Send + Sync;

    /// Resource name for logs and messages.
    const RESOURCE: &'static str;

    /// Read everything in `scope`.
    async fn fetch(store: &dyn DocumentStore, scope: &StoreId)
    -> Result<Self::Snapshot, StoreError>;
}

/// A document type that carries its own `storeId`.
pub trait ScopedRecord: Sized + Send {
    /// Collection the records live in.
    const COLLECTION: Collection;

    /// Decode a document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Decode` if the document does not match.
    fn from_document(doc: &Document) -> Result<Self, StoreError>;

    /// The store the record belongs to.
    fn store_id(&self) -> &StoreId;
}

/// Query every `T` whose `storeId` equals `scope`.
///
/// Documents that come back from another store are dropped, and documents
/// that do not decode are skipped; both are logged.
///
/// # Errors
///
/// Returns the store's error if the query itself fails.
pub async fn fetch_scoped<T: ScopedRecord>(
    store: &dyn DocumentStore,
    scope: &StoreId,
) -> Result<Vec<T>, StoreError> {
    let docs = store
        .query_eq(T::COLLECTION, "storeId", &Value::from(scope.as_str()))
        .await?;

    let mut records = Vec::with_capacity(docs.len());
    for doc in &docs {
        match T::from_document(doc) {
            Ok(record) if record.store_id() == scope => records.push(record),
            Ok(record) => tracing::warn!(
                collection = %T::COLLECTION,
                id = %doc.id,
                store_id = %record.store_id(),
                scope = %scope,
                "Dropping document from another store"
            ),
            Err(e) => tracing::warn!(
                collection = %T::COLLECTION,
                id = %doc.id,
                error = %e,
                "Skipping undecodable document"
            ),
        }
    }
    Ok(records)
}

/// Errors returned by view mutations.
///
/// The presented snapshot is never modified when a mutation fails.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Candidate input rejected before any write.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The target is not in the view's snapshot.
    #[error("{resource} {id} is not part of this store")]
    OutOfScope {
        /// Resource name.
        resource: &'static str,
        /// Requested document ID.
        id: String,
    },

    /// The write failed; retrying may succeed.
    #[error("write failed: {0}")]
    Write(#[source] StoreError),

    /// The write succeeded but the follow-up read failed.
    #[error("saved, but reloading failed: {0}")]
    Refresh(#[source] StoreError),
}

impl MutationError {
    /// Whether repeating the same action may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_) | Self::Refresh(_))
    }

    /// Message shown next to the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(e) => e.to_string(),
            Self::OutOfScope { resource, .. } => {
                format!("That {resource} does not belong to your store.")
            }
            Self::Write(StoreError::NotFound {
                collection: Collection::Stores,
                ..
            }) => "Your store configuration has not been set up yet.".to_string(),
            Self::Write(StoreError::NotFound { .. }) => {
                "That item no longer exists. Reload the page and try again.".to_string()
            }
            Self::Write(_) => "Could not save your changes. Please try again.".to_string(),
            Self::Refresh(_) => {
                "Your changes were saved, but the list could not be reloaded. Reload the page."
                    .to_string()
            }
        }
    }
}

/// Log a failed write and wrap it.
fn write_failed(error: StoreError) -> MutationError {
    tracing::warn!(error = %error, "Write failed");
    MutationError::Write(error)
}

/// A store-scoped view over one resource type.
pub struct ResourceView<R: ScopedFetch> {
    store: Arc<dyn DocumentStore>,
    admin: StoreAdmin,
    snapshot: R::Snapshot,
}

impl<R: ScopedFetch> ResourceView<R> {
    /// Open a view with an empty snapshot.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>, admin: StoreAdmin) -> Self {
        Self {
            store,
            admin,
            snapshot: R::Snapshot::default(),
        }
    }

    /// Open a view and read its slice.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the read fails.
    pub async fn load(store: Arc<dyn DocumentStore>, admin: StoreAdmin) -> Result<Self, StoreError> {
        let mut view = Self::open(store, admin);
        view.refresh().await?;
        Ok(view)
    }

    /// The store every read and write is scoped to.
    #[must_use]
    pub const fn scope(&self) -> &StoreId {
        self.admin.store_id()
    }

    #[must_use]
    pub const fn admin(&self) -> &StoreAdmin {
        &self.admin
    }

    /// What is currently presented.
    #[must_use]
    pub const fn snapshot(&self) -> &R::Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn into_snapshot(self) -> R::Snapshot {
        self.snapshot
    }

    /// Re-read the slice and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error; the snapshot is left as it was.
    #[instrument(skip(self), fields(resource = R::RESOURCE, store_id = %self.admin.store_id()))]
    pub async fn refresh(&mut self) -> Result<&R::Snapshot, StoreError> {
        self.snapshot = R::fetch(self.store.as_ref(), self.admin.store_id()).await?;
        Ok(&self.snapshot)
    }

    async fn refresh_after_write(&mut self) -> Result<(), MutationError> {
        match self.refresh().await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(resource = R::RESOURCE, error = %e, "Refresh after write failed");
                Err(MutationError::Refresh(e))
            }
        }
    }
}
