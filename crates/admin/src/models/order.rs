//! Orders (`orders/{id}`).
//!
//! Orders are placed by the storefront; the back-office only reads them and
//! changes their status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storedesk_core::{OrderId, OrderStatus, Price, StoreId};

use crate::store::{Document, Fields, StoreError, to_fields};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: String,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
}

impl OrderItem {
    /// Price times quantity, or `None` if the product overflows a `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.amount().checked_mul(Decimal::from(self.quantity))
    }
}

/// An order placed against one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub items: Vec<OrderItem>,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRecord {
    store_id: StoreId,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    user_email: String,
    #[serde(default)]
    items: Vec<OrderItem>,
    #[serde(default)]
    total: Price,
    #[serde(default)]
    status: OrderStatus,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Decode an order document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Decode` if the document is not an order.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let record: OrderRecord = doc.decode()?;
        Ok(Self {
            id: OrderId::new(doc.id.clone()),
            store_id: record.store_id,
            user_id: record.user_id,
            user_name: record.user_name,
            user_email: record.user_email,
            items: record.items,
            total: record.total,
            status: record.status,
            created_at: record.created_at,
        })
    }

    /// Total number of units across all lines, saturating at `u32::MAX`.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count, item| count.saturating_add(item.quantity))
    }
}

#[derive(Serialize)]
struct StatusUpdate {
    status: OrderStatus,
}

/// Document fields for a status-only update.
pub(crate) fn status_fields(status: OrderStatus) -> Result<Fields, StoreError> {
    to_fields(&StatusUpdate { status })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_document() {
        let fields = to_fields(&json!({
            "storeId": "store-1",
            "userId": "cust-9",
            "userName": "Ana",
            "userEmail": "ana@example.com",
            "items": [
                {"productId": "p1", "name": "Mug", "price": 4.5, "quantity": 2},
                {"productId": "p2", "name": "Tea", "price": 3, "quantity": 1}
            ],
            "total": 12,
            "status": "processing",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        let order = Order::from_document(&Document::new("o1".to_string(), fields)).unwrap();

        assert_eq!(order.id.as_str(), "o1");
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.item_count(), 3);
        assert_eq!(
            order.items.first().and_then(OrderItem::line_total),
            Some(Decimal::new(9, 0))
        );
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_sparse_order_defaults() {
        let fields = to_fields(&json!({"storeId": "store-1"})).unwrap();
        let order = Order::from_document(&Document::new("o2".to_string(), fields)).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.items.is_empty());
        assert_eq!(order.total, Price::ZERO);
    }

    #[test]
    fn test_oversized_lines_do_not_panic() {
        let huge = OrderItem {
            product_id: "p1".to_string(),
            name: "Bulk".to_string(),
            price: Price::new(Decimal::MAX).unwrap(),
            quantity: u32::MAX,
        };
        assert_eq!(huge.line_total(), None);

        let fields = to_fields(&json!({"storeId": "store-1"})).unwrap();
        let mut order = Order::from_document(&Document::new("o3".to_string(), fields)).unwrap();
        order.items = vec![huge.clone(), huge];
        assert_eq!(order.item_count(), u32::MAX);
    }

    #[test]
    fn test_status_fields() {
        let fields = status_fields(OrderStatus::Cancelled).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["status"], json!("cancelled"));
    }
}
