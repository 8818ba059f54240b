//! Cloud Firestore REST client.
//!
//! Talks to the Firestore v1 REST API as the signed-in principal: every
//! request carries the principal's ID token, so the project's security rules
//! apply exactly as they would to a browser client.
//!
//! Firestore represents field values as typed wrappers
//! (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). The codec at the
//! bottom of this module converts between those and plain JSON so the rest of
//! the back-office only ever sees `serde_json::Value`.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::instrument;
use url::Url;

use super::{Collection, Document, DocumentStore, Fields, StoreError};
use crate::config::FirebaseConfig;
use crate::identity::IdentityProvider;

/// Firestore REST client.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<FirestoreStoreInner>,
}

struct FirestoreStoreInner {
    client: reqwest::Client,
    /// `.../projects/{project}/databases/(default)/documents`
    documents_url: String,
    identity: Arc<dyn IdentityProvider>,
}

/// A document resource as returned by the REST API.
#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

impl FirestoreDocument {
    fn into_document(self) -> Result<Document, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let fields = match self.fields {
            Some(fields) => decode_fields(&fields)?,
            None => Fields::new(),
        };
        Ok(Document::new(id, fields))
    }
}

/// One element of a `runQuery` response stream.
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<FirestoreDocument>,
}

/// Documents of a `runQuery` response. Undecodable documents are skipped with
/// a warning.
fn query_documents(items: Vec<RunQueryItem>) -> Vec<Document> {
    items
        .into_iter()
        .filter_map(|item| item.document)
        .filter_map(|doc| {
            let name = doc.name.clone();
            doc.into_document()
                .map_err(|e| {
                    tracing::warn!(document = %name, error = %e, "Skipping undecodable document");
                })
                .ok()
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl FirestoreStore {
    /// Create a client for the configured project, authenticating as
    /// whoever is signed in to `identity`.
    #[must_use]
    pub fn new(config: &FirebaseConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), config, identity)
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        config: &FirebaseConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(FirestoreStoreInner {
                client,
                documents_url: config.firestore_documents_url(),
                identity,
            }),
        }
    }

    // =========================================================================
    // URLs
    // =========================================================================

    fn base_url(&self, suffix: &str) -> Result<Url, StoreError> {
        Url::parse(&format!("{}{suffix}", self.inner.documents_url))
            .map_err(|e| StoreError::Unavailable(format!("invalid documents URL: {e}")))
    }

    fn collection_url(&self, collection: Collection) -> Result<Url, StoreError> {
        let mut url = self.base_url("")?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("documents URL cannot be a base".to_string()))?
            .push(collection.as_str());
        Ok(url)
    }

    fn document_url(&self, collection: Collection, id: &str) -> Result<Url, StoreError> {
        if id.trim().is_empty() {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        let mut url = self.collection_url(collection)?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("documents URL cannot be a base".to_string()))?
            .push(id);
        Ok(url)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Attach the signed-in principal's ID token, if any.
    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(match self.inner.identity.id_token().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        collection: Collection,
        id: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self.authorize(request).await?.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(response_error(response, collection, id).await)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self), fields(collection = %collection))]
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let url = match self.document_url(collection, id) {
            Ok(url) => url,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match self.send(self.inner.client.get(url), collection, id).await {
            Ok(response) => {
                let doc: FirestoreDocument = response.json().await?;
                Ok(Some(doc.into_document()?))
            }
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, value), fields(collection = %collection))]
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let url = self.base_url(":runQuery")?;
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection.as_str() }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let response = self
            .send(self.inner.client.post(url).json(&body), collection, "")
            .await?;
        let items: Vec<RunQueryItem> = response.json().await?;

        let docs = query_documents(items);
        tracing::debug!(count = docs.len(), "Query returned documents");
        Ok(docs)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError> {
        let url = self.collection_url(collection)?;
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self
            .send(self.inner.client.post(url).json(&body), collection, "")
            .await?;
        let doc: FirestoreDocument = response.json().await?;
        let created = doc.into_document()?;
        tracing::info!(id = %created.id, "Created document");
        Ok(created.id)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut url = self.document_url(collection, id)?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", &field_path(name));
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = json!({ "fields": encode_fields(&fields) });

        self.send(self.inner.client.patch(url).json(&body), collection, id)
            .await?;
        tracing::info!("Updated document");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut url = self.document_url(collection, id)?;
        url.query_pairs_mut()
            .append_pair("currentDocument.exists", "true");

        self.send(self.inner.client.delete(url), collection, id)
            .await?;
        tracing::info!("Deleted document");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

/// Turn a non-success response into a `StoreError`.
async fn response_error(response: reqwest::Response, collection: Collection, id: &str) -> StoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or(text);

    match status.as_u16() {
        404 => StoreError::NotFound {
            collection,
            id: id.to_string(),
        },
        401 => StoreError::Unauthenticated,
        403 => StoreError::PermissionDenied(message),
        503 => StoreError::Unavailable(message),
        code => StoreError::Backend {
            status: code,
            message,
        },
    }
}

/// Quote a field name for use as a Firestore field path.
///
/// Simple identifiers pass through; anything else is wrapped in backticks.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

// =============================================================================
// Value codec
// =============================================================================

/// Encode a plain JSON value as a Firestore typed value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64() }),
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a field map as a Firestore `fields` object.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Decode a Firestore `fields` object into a plain field map.
///
/// # Errors
///
/// Returns `StoreError::Decode` if any value is malformed.
pub fn decode_fields(fields: &Value) -> Result<Fields, StoreError> {
    let Value::Object(map) = fields else {
        return Err(StoreError::Decode(format!("expected fields object, got {fields}")));
    };
    map.iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a Firestore typed value into plain JSON.
///
/// Timestamps, references and bytes become strings; geo points become
/// `{latitude, longitude}` objects.
///
/// # Errors
///
/// Returns `StoreError::Decode` if the value is not a recognised wrapper.
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let malformed = || StoreError::Decode(format!("malformed Firestore value: {value}"));
    let Value::Object(wrapper) = value else {
        return Err(malformed());
    };
    let Some((kind, inner)) = wrapper.iter().next() else {
        return Err(malformed());
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => match inner {
            Value::Bool(_) | Value::Number(_) => Ok(inner.clone()),
            // NaN and the infinities arrive as strings and have no JSON form
            _ => Err(malformed()),
        },
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).map_err(|_| malformed()),
            Value::Number(_) => Ok(inner.clone()),
            _ => Err(malformed()),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => match inner {
            Value::String(_) => Ok(inner.clone()),
            _ => Err(malformed()),
        },
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(Value::from(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(Value::from(0.0)),
        })),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or_else(|| Ok(Vec::new()), |values| values.iter().map(decode_value).collect())
            .map(Value::Array),
        "mapValue" => inner
            .get("fields")
            .map_or_else(|| Ok(Map::new()), decode_fields)
            .map(Value::Object),
        _ => Err(malformed()),
    }
}
