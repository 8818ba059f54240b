//! Order view: list and status changes.

use std::cmp::Reverse;

use async_trait::async_trait;
use tracing::instrument;

use storedesk_core::{OrderId, OrderStatus, StoreId};

use super::{MutationError, ResourceView, ScopedFetch, ScopedRecord, fetch_scoped, write_failed};
use crate::models::Order;
use crate::models::order::status_fields;
use crate::store::{Collection, Document, DocumentStore, StoreError};

impl ScopedRecord for Order {
    const COLLECTION: Collection = Collection::Orders;

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Self::from_document(doc)
    }

    fn store_id(&self) -> &StoreId {
        &self.store_id
    }
}

#[async_trait]
impl ScopedFetch for Order {
    type Snapshot = Vec<Self>;
    const RESOURCE: &'static str = "order";

    async fn fetch(store: &dyn DocumentStore, scope: &StoreId) -> Result<Vec<Self>, StoreError> {
        let mut orders: Vec<Self> = fetch_scoped(store, scope).await?;
        // Newest first; undated orders last
        orders.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(orders)
    }
}

/// The store's orders.
pub type OrdersView = ResourceView<Order>;

impl ResourceView<Order> {
    /// An order in the current snapshot.
    #[must_use]
    pub fn find(&self, id: &OrderId) -> Option<&Order> {
        self.snapshot.iter().find(|order| &order.id == id)
    }

    /// Number of orders in the snapshot with `status`.
    #[must_use]
    pub fn count_with_status(&self, status: OrderStatus) -> usize {
        self.snapshot
            .iter()
            .filter(|order| order.status == status)
            .count()
    }

    /// Set the status of an order in the snapshot, then refresh.
    ///
    /// Any status may follow any other.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::OutOfScope` if the order is not in the
    /// snapshot, `MutationError::Write` if the update failed, or
    /// `MutationError::Refresh` if the list could not be re-read.
    #[instrument(skip(self), fields(store_id = %self.scope(), order_id = %id, status = %status))]
    pub async fn update_status(&mut self, id: &OrderId, status: OrderStatus) -> Result<(), MutationError> {
        if self.find(id).is_none() {
            return Err(MutationError::OutOfScope {
                resource: <Order as ScopedFetch>::RESOURCE,
                id: id.to_string(),
            });
        }

        let fields = status_fields(status).map_err(MutationError::Write)?;
        self.store
            .update(Collection::Orders, id.as_str(), fields)
            .await
            .map_err(write_failed)?;
        tracing::info!("Updated order status");

        self.refresh_after_write().await
    }
}
