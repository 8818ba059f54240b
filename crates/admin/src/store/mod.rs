//! Document store boundary.
//!
//! All back-office data lives in a remote document database. This module
//! defines the five operations the back-office needs from it; there is no
//! local storage, caching or transaction layer.
//!
//! # Collections
//!
//! - `users` - Authorization records keyed by principal uid
//! - `stores` - Store configuration keyed by store ID
//! - `products` - Products, scoped by `storeId`
//! - `orders` - Orders, scoped by `storeId`
//!
//! # Implementations
//!
//! - [`FirestoreStore`] - Cloud Firestore REST API
//! - [`MemoryStore`] - in-process collections for tests and local runs

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::identity::IdentityError;

/// Field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// A document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Stores,
    Products,
    Orders,
}

impl Collection {
    /// Collection name in the document store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Stores => "stores",
            Self::Products => "products",
            Self::Orders => "orders",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document read from the store: its key plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document key within its collection.
    pub id: String,
    /// Field values.
    pub fields: Fields,
}

impl Document {
    /// Create a document.
    #[must_use]
    pub const fn new(id: String, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Deserialize the fields into a typed model.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Decode` if the fields do not match the model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Decode(format!("document {} does not match model: {e}", self.id))
        })
    }

    /// A single field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Serialize a model into a field map for `add`/`update`.
///
/// # Errors
///
/// Returns `StoreError::Decode` if the value does not serialize to an object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Decode(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

/// Errors returned by document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Update or delete of a document that does not exist.
    #[error("{collection}/{id} not found")]
    NotFound {
        /// Collection that was addressed.
        collection: Collection,
        /// Document key that was addressed.
        id: String,
    },

    /// The store's security rules rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The request carried no valid credentials.
    #[error("not authenticated with the document store")]
    Unauthenticated,

    /// Any other non-success response.
    #[error("document store returned {status}: {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The store is unreachable or refused the write.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// Document contents could not be converted.
    #[error("decode error: {0}")]
    Decode(String),

    /// The ID token for the request could not be obtained.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    /// Whether this error is a missing document.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Operations on the remote document database.
///
/// Implementations are expected to behave like a request/response API: each
/// call completes or fails on its own, and nothing is cached between calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key. A missing document is `Ok(None)`.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// All documents whose `field` equals `value`. Order is unspecified.
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Create a document with a store-assigned key and return the key.
    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError>;

    /// Overwrite the given top-level fields of an existing document.
    async fn update(&self, collection: Collection, id: &str, fields: Fields)
    -> Result<(), StoreError>;

    /// Delete an existing document.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Shelf {
        label: String,
        store_id: String,
    }

    #[test]
    fn test_decode_uses_fields() {
        let fields = to_fields(&json!({"label": "A1", "storeId": "s1"})).unwrap();
        let doc = Document::new("shelf-1".to_string(), fields);

        let shelf: Shelf = doc.decode().unwrap();
        assert_eq!(shelf.label, "A1");
        assert_eq!(doc.field("storeId"), Some(&json!("s1")));
    }

    #[test]
    fn test_decode_reports_document_id() {
        let doc = Document::new("bad".to_string(), to_fields(&json!({"label": 3})).unwrap());
        let err = doc.decode::<Shelf>().unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(matches!(to_fields(&3), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound {
            collection: Collection::Products,
            id: "p1".to_string(),
        };
        assert_eq!(err.to_string(), "products/p1 not found");
        assert!(err.is_not_found());
    }
}
