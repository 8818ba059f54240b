//! In-process document store.
//!
//! Collections are `BTreeMap`s behind a `RwLock`. Not durable; used by the
//! test suites. Reads and writes can be made to fail on demand to exercise
//! the back-office's error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{Collection, Document, DocumentStore, Fields, StoreError};

type Collections = HashMap<Collection, BTreeMap<String, Fields>>;

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document. Non-object values are ignored.
    #[must_use]
    pub fn with_document(self, collection: Collection, id: &str, value: Value) -> Self {
        self.insert(collection, id, value);
        self
    }

    /// Insert or replace a document. Non-object values are ignored.
    pub fn insert(&self, collection: Collection, id: &str, value: Value) {
        if let Value::Object(fields) = value {
            self.write()
                .entry(collection)
                .or_default()
                .insert(id.to_string(), fields);
        }
    }

    /// Current fields of a document, bypassing failure injection and counters.
    #[must_use]
    pub fn document(&self, collection: Collection, id: &str) -> Option<Fields> {
        self.read()
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.read().get(&collection).map_or(0, BTreeMap::len)
    }

    /// Whether a collection has no documents.
    #[must_use]
    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of read operations served (`get` and `query_eq`).
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write operations attempted.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads are failing".to_string()));
        }
        Ok(())
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are failing".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.begin_read()?;
        Ok(self
            .read()
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id.to_string(), fields.clone())))
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.begin_read()?;
        Ok(self
            .read()
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| fields.get(field) == Some(value))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError> {
        self.begin_write()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.write()
            .entry(collection)
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.begin_write()?;
        let mut collections = self.write();
        let existing = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.begin_write()?;
        self.write()
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_query_eq_filters_by_field() {
        let store = MemoryStore::new()
            .with_document(Collection::Products, "p1", json!({"storeId": "s1"}))
            .with_document(Collection::Products, "p2", json!({"storeId": "s2"}))
            .with_document(Collection::Products, "p3", json!({"storeId": "s1"}));

        let docs = store
            .query_eq(Collection::Products, "storeId", &json!("s1"))
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[tokio::test]
    async fn test_update_merges_top_level_fields() {
        let store = MemoryStore::new().with_document(
            Collection::Orders,
            "o1",
            json!({"status": "pending", "total": 5}),
        );
        let mut patch = Fields::new();
        patch.insert("status".to_string(), json!("completed"));

        store.update(Collection::Orders, "o1", patch).await.unwrap();

        let doc = store.document(Collection::Orders, "o1").unwrap();
        assert_eq!(doc.get("status"), Some(&json!("completed")));
        assert_eq!(doc.get("total"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_documents() {
        let store = MemoryStore::new();
        let update = store.update(Collection::Stores, "s1", Fields::new()).await;
        assert!(update.unwrap_err().is_not_found());

        let delete = store.delete(Collection::Products, "p1").await;
        assert!(delete.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.add(Collection::Products, Fields::new()).await.is_err());
        assert!(store.is_empty(Collection::Products));
        assert_eq!(store.write_count(), 1);

        store.set_fail_reads(true);
        assert!(store.get(Collection::Users, "u1").await.is_err());
    }
}
