//! Product view: list, create, update, delete.

use async_trait::async_trait;
use tracing::instrument;

use storedesk_core::{ProductId, StoreId};

use super::{MutationError, ResourceView, ScopedFetch, ScopedRecord, fetch_scoped, write_failed};
use crate::models::{NewProduct, Product, ProductPatch};
use crate::store::{Collection, Document, DocumentStore, StoreError};

impl ScopedRecord for Product {
    const COLLECTION: Collection = Collection::Products;

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Self::from_document(doc)
    }

    fn store_id(&self) -> &StoreId {
        &self.store_id
    }
}

#[async_trait]
impl ScopedFetch for Product {
    type Snapshot = Vec<Self>;
    const RESOURCE: &'static str = "product";

    async fn fetch(store: &dyn DocumentStore, scope: &StoreId) -> Result<Vec<Self>, StoreError> {
        let mut products: Vec<Self> = fetch_scoped(store, scope).await?;
        products.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(products)
    }
}

/// The store's products.
pub type ProductsView = ResourceView<Product>;

impl ResourceView<Product> {
    /// A product in the current snapshot.
    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<&Product> {
        self.snapshot.iter().find(|product| &product.id == id)
    }

    fn ensure_in_scope(&self, id: &ProductId) -> Result<(), MutationError> {
        if self.find(id).is_none() {
            return Err(MutationError::OutOfScope {
                resource: Self::resource(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    const fn resource() -> &'static str {
        <Product as ScopedFetch>::RESOURCE
    }

    /// Add a product to the store, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Write` if the product could not be created, or
    /// `MutationError::Refresh` if it was created but the list could not be
    /// re-read.
    #[instrument(skip(self, candidate), fields(store_id = %self.scope(), name = candidate.name()))]
    pub async fn create(&mut self, candidate: NewProduct) -> Result<ProductId, MutationError> {
        let fields = candidate
            .into_fields(self.scope())
            .map_err(MutationError::Write)?;
        let id = self
            .store
            .add(Collection::Products, fields)
            .await
            .map_err(write_failed)?;
        tracing::info!(product_id = %id, "Created product");

        self.refresh_after_write().await?;
        Ok(ProductId::new(id))
    }

    /// Change some fields of a product in the snapshot, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Invalid` for an empty or invalid patch,
    /// `MutationError::OutOfScope` if the product is not in the snapshot, and
    /// `MutationError::Write`/`Refresh` as for [`Self::create`].
    #[instrument(skip(self, patch), fields(store_id = %self.scope(), product_id = %id))]
    pub async fn update(&mut self, id: &ProductId, patch: ProductPatch) -> Result<(), MutationError> {
        patch.validate()?;
        self.ensure_in_scope(id)?;

        let fields = patch.to_fields().map_err(MutationError::Write)?;
        self.store
            .update(Collection::Products, id.as_str(), fields)
            .await
            .map_err(write_failed)?;
        tracing::info!("Updated product");

        self.refresh_after_write().await
    }

    /// Delete a product in the snapshot, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::OutOfScope` if the product is not in the
    /// snapshot, and `MutationError::Write`/`Refresh` as for [`Self::create`].
    #[instrument(skip(self), fields(store_id = %self.scope(), product_id = %id))]
    pub async fn delete(&mut self, id: &ProductId) -> Result<(), MutationError> {
        self.ensure_in_scope(id)?;

        self.store
            .delete(Collection::Products, id.as_str())
            .await
            .map_err(write_failed)?;
        tracing::info!("Deleted product");

        self.refresh_after_write().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use storedesk_core::Price;

    use super::*;
    use crate::gate::StoreAdmin;
    use crate::models::ValidationError;
    use crate::store::MemoryStore;

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_document(
                    Collection::Products,
                    "mug",
                    json!({"name": "Mug", "description": "", "price": 8, "storeId": "store-1"}),
                )
                .with_document(
                    Collection::Products,
                    "tea",
                    json!({"name": "Tea", "description": "Green", "price": 4.5, "storeId": "store-1"}),
                )
                .with_document(
                    Collection::Products,
                    "foreign",
                    json!({"name": "Anvil", "description": "", "price": 99, "storeId": "store-2"}),
                ),
        )
    }

    async fn view(store: &Arc<MemoryStore>) -> ProductsView {
        ResourceView::load(store.clone(), StoreAdmin::for_tests("admin-1", "store-1"))
            .await
            .unwrap()
    }

    fn names(view: &ProductsView) -> Vec<&str> {
        view.snapshot().iter().map(|p| p.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_is_scoped_and_repeatable() {
        let store = seeded();
        let mut view = view(&store).await;
        assert_eq!(names(&view), vec!["Mug", "Tea"]);
        assert!(view.snapshot().iter().all(|p| p.store_id.as_str() == "store-1"));

        let first = view.snapshot().clone();
        let second = view.refresh().await.unwrap().clone();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store).await;
        assert!(view.snapshot().is_empty());

        let id = view
            .create(NewProduct::parse("Widget", "", "9.99").unwrap())
            .await
            .unwrap();

        let products = view.snapshot();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, id);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, Price::parse("9.99").unwrap());
        assert_eq!(products[0].store_id.as_str(), "store-1");
        assert_eq!(
            store.document(Collection::Products, id.as_str()).unwrap()["storeId"],
            json!("store-1")
        );
    }

    #[tokio::test]
    async fn test_failed_create_leaves_snapshot() {
        let store = seeded();
        let mut view = view(&store).await;
        let before = view.snapshot().clone();
        store.set_fail_writes(true);

        let err = view
            .create(NewProduct::parse("Widget", "", "1").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Write(_)));
        assert!(err.is_retryable());
        assert_eq!(view.snapshot(), &before);
        assert_eq!(store.len(Collection::Products), 3);
    }

    #[tokio::test]
    async fn test_refresh_failure_after_write_is_reported() {
        let store = seeded();
        let mut view = view(&store).await;
        let before = view.snapshot().clone();
        store.set_fail_reads(true);

        let err = view
            .create(NewProduct::parse("Widget", "", "1").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Refresh(_)));
        assert_eq!(view.snapshot(), &before);
        assert_eq!(store.len(Collection::Products), 4);
    }

    #[tokio::test]
    async fn test_update_then_read() {
        let store = seeded();
        let mut view = view(&store).await;
        let patch = ProductPatch::parse("Big Mug", "Holds more", "10.50").unwrap();

        view.update(&ProductId::new("mug"), patch).await.unwrap();

        let mug = view.find(&ProductId::new("mug")).unwrap();
        assert_eq!(mug.name, "Big Mug");
        assert_eq!(mug.description, "Holds more");
        assert_eq!(mug.price.to_string(), "10.50");
        assert_eq!(mug.store_id.as_str(), "store-1");
    }

    #[tokio::test]
    async fn test_other_store_documents_are_out_of_scope() {
        let store = seeded();
        let mut view = view(&store).await;
        let writes = store.write_count();
        let foreign = ProductId::new("foreign");

        let update = view
            .update(&foreign, ProductPatch::parse("Mine now", "", "1").unwrap())
            .await;
        assert!(matches!(update, Err(MutationError::OutOfScope { .. })));

        let delete = view.delete(&foreign).await;
        assert!(matches!(delete, Err(MutationError::OutOfScope { .. })));

        assert_eq!(store.write_count(), writes);
        assert_eq!(
            store.document(Collection::Products, "foreign").unwrap()["name"],
            json!("Anvil")
        );
    }

    #[tokio::test]
    async fn test_invalid_patch_is_rejected_before_write() {
        let store = seeded();
        let mut view = view(&store).await;
        let writes = store.write_count();

        let err = view
            .update(&ProductId::new("mug"), ProductPatch::default())
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Invalid(ValidationError::EmptyPatch)));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_delete_then_read() {
        let store = seeded();
        let mut view = view(&store).await;

        view.delete(&ProductId::new("tea")).await.unwrap();

        assert_eq!(names(&view), vec!["Mug"]);
        assert!(store.document(Collection::Products, "tea").is_none());
    }
}
