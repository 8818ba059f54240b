//! Products (`products/{id}`).

use serde::{Deserialize, Serialize};

use storedesk_core::{Price, ProductId, StoreId};

use super::ValidationError;
use crate::store::{Document, Fields, StoreError, to_fields};

/// A product belonging to one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub store_id: StoreId,
}

/// Stored fields of a product document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    name: String,
    #[serde(default)]
    description: String,
    price: Price,
    store_id: StoreId,
}

impl Product {
    /// Decode a product document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Decode` if the document is not a product.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let record: ProductRecord = doc.decode()?;
        Ok(Self {
            id: ProductId::new(doc.id.clone()),
            name: record.name,
            description: record.description,
            price: record.price,
            store_id: record.store_id,
        })
    }
}

/// A validated product candidate, not yet bound to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    name: String,
    description: String,
    price: Price,
}

impl NewProduct {
    /// Validate a product candidate.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::BlankName` if the trimmed name is empty.
    pub fn new(name: &str, description: &str, price: Price) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankName);
        }
        Ok(Self {
            name: name.to_string(),
            description: description.trim().to_string(),
            price,
        })
    }

    /// Validate form input, coercing the price text to a number.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a blank name or an invalid price.
    pub fn parse(name: &str, description: &str, price: &str) -> Result<Self, ValidationError> {
        let price = Price::parse(price)?;
        Self::new(name, description, price)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn price(&self) -> Price {
        self.price
    }

    /// Document fields for this candidate, scoped to `store_id`.
    pub(crate) fn into_fields(self, store_id: &StoreId) -> Result<Fields, StoreError> {
        to_fields(&ProductRecord {
            name: self.name,
            description: self.description,
            price: self.price,
            store_id: store_id.clone(),
        })
    }
}

/// Partial product update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl ProductPatch {
    /// Build a full patch from the edit form.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a blank name or an invalid price.
    pub fn parse(name: &str, description: &str, price: &str) -> Result<Self, ValidationError> {
        let patch = Self {
            name: Some(name.trim().to_string()),
            description: Some(description.trim().to_string()),
            price: Some(Price::parse(price)?),
        };
        patch.validate()?;
        Ok(patch)
    }

    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.price.is_none()
    }

    /// Check the patch can be written.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyPatch` if nothing is set, or
    /// `ValidationError::BlankName` if the name is set but blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ValidationError::BlankName);
        }
        Ok(())
    }

    pub(crate) fn to_fields(&self) -> Result<Fields, StoreError> {
        to_fields(self)
    }
}
