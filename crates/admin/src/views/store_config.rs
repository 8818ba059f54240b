//! Store configuration view.
//!
//! Unlike products and orders, a successful save replaces the presented
//! configuration with the submitted values instead of re-reading it.

use async_trait::async_trait;
use tracing::instrument;

use storedesk_core::StoreId;

use super::{MutationError, ResourceView, ScopedFetch, write_failed};
use crate::models::StoreProfile;
use crate::store::{Collection, DocumentStore, StoreError, to_fields};

#[async_trait]
impl ScopedFetch for StoreProfile {
    /// `None` until the store document has been provisioned.
    type Snapshot = Option<Self>;
    const RESOURCE: &'static str = "store";

    async fn fetch(store: &dyn DocumentStore, scope: &StoreId) -> Result<Option<Self>, StoreError> {
        match store.get(Collection::Stores, scope.as_str()).await? {
            Some(doc) => doc.decode().map(Some),
            None => {
                tracing::debug!(store_id = %scope, "No store configuration yet");
                Ok(None)
            }
        }
    }
}

/// The store's configuration.
pub type StoreConfigView = ResourceView<StoreProfile>;

impl ResourceView<StoreProfile> {
    /// Save the configuration and present the submitted values.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Write` if the save failed, including when the
    /// store document does not exist yet.
    #[instrument(skip(self, profile), fields(store_id = %self.scope()))]
    pub async fn update(&mut self, profile: StoreProfile) -> Result<(), MutationError> {
        let fields = to_fields(&profile).map_err(MutationError::Write)?;
        self.store
            .update(Collection::Stores, self.scope().as_str(), fields)
            .await
            .map_err(write_failed)?;
        tracing::info!("Updated store configuration");

        self.snapshot = Some(profile);
        Ok(())
    }
}
