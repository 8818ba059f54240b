//! Order management route handlers.

use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use storedesk_core::{OrderId, OrderStatus};

use crate::{
    error::AppError,
    filters,
    gate::StoreAdmin,
    middleware::auth::RequireStoreAdmin,
    models::{Order, OrderItem, ValidationError},
    state::AppState,
    views::{MutationError, OrdersView},
};

use super::{LOAD_FAILED, dashboard::AdminView, mutation_status, render};

/// Form input for changing an order's status.
#[derive(Debug, Deserialize)]
pub struct StatusFormInput {
    pub status: String,
}

/// One entry of a status picker.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl StatusOption {
    fn all(current: OrderStatus) -> Vec<Self> {
        OrderStatus::ALL
            .into_iter()
            .map(|status| Self {
                value: status.as_str(),
                label: status.label(),
                selected: status == current,
            })
            .collect()
    }
}

/// Order line for templates.
#[derive(Debug, Clone)]
pub struct OrderItemRow {
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemRow {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.price.to_string(),
            line_total: item
                .line_total()
                .map_or_else(|| "n/a".to_string(), |total| format!("{total:.2}")),
        }
    }
}

/// Order row for templates.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderItemRow>,
    pub item_count: u32,
    pub total: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub placed_at: String,
    pub status_options: Vec<StatusOption>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_name: order.user_name.clone(),
            customer_email: order.user_email.clone(),
            items: order.items.iter().map(OrderItemRow::from).collect(),
            item_count: order.item_count(),
            total: order.total.to_string(),
            status: order.status.as_str(),
            status_label: order.status.label(),
            placed_at: order
                .created_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default(),
            status_options: StatusOption::all(order.status),
        }
    }
}

/// Number of orders in one status.
#[derive(Debug, Clone)]
pub struct StatusCount {
    pub label: &'static str,
    pub count: usize,
}

/// Order list page template.
#[derive(Template)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub admin: AdminView,
    pub current_path: String,
    pub orders: Vec<OrderRow>,
    pub counts: Vec<StatusCount>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

fn index_page(
    admin: &StoreAdmin,
    view: &OrdersView,
    error: Option<String>,
    notice: Option<String>,
) -> OrdersIndexTemplate {
    OrdersIndexTemplate {
        admin: AdminView::from(admin),
        current_path: "/orders".to_string(),
        orders: view.snapshot().iter().map(OrderRow::from).collect(),
        counts: OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                label: status.label(),
                count: view.count_with_status(status),
            })
            .collect(),
        error,
        notice,
    }
}

/// Orders list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
) -> Response {
    match OrdersView::load(state.store(), admin.clone()).await {
        Ok(view) => render(&index_page(&admin, &view, None, None)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load orders");
            let view = OrdersView::open(state.store(), admin.clone());
            (
                StatusCode::BAD_GATEWAY,
                render(&index_page(&admin, &view, Some(LOAD_FAILED.to_string()), None)),
            )
                .into_response()
        }
    }
}

/// Order status change handler.
#[instrument(skip(admin, state, input), fields(status = %input.status))]
pub async fn update_status(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(input): Form<StatusFormInput>,
) -> Result<Response, AppError> {
    let mut view = OrdersView::load(state.store(), admin.clone()).await?;
    let order_id = OrderId::new(id);

    let result = match input.status.parse::<OrderStatus>() {
        Ok(status) => view.update_status(&order_id, status).await.map(|()| status),
        Err(_) => Err(MutationError::Invalid(ValidationError::UnknownStatus(
            input.status,
        ))),
    };

    let response = match result {
        Ok(status) => {
            tracing::info!(order_id = %order_id, status = %status, "Order status updated");
            let notice = format!("Order {order_id} marked {}.", status.label());
            render(&index_page(&admin, &view, None, Some(notice))).into_response()
        }
        Err(e) => (
            mutation_status(&e),
            render(&index_page(&admin, &view, Some(e.user_message()), None)),
        )
            .into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use storedesk_core::{Price, StoreId};

    use super::*;

    fn order() -> Order {
        Order {
            id: OrderId::new("o1"),
            store_id: StoreId::new("store-1"),
            user_id: "u9".to_string(),
            user_name: "Ana".to_string(),
            user_email: "ana@example.com".to_string(),
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Widget".to_string(),
                price: Price::new(Decimal::new(250, 2)).unwrap_or_default(),
                quantity: 2,
            }],
            total: Price::new(Decimal::new(500, 2)).unwrap_or_default(),
            status: OrderStatus::Processing,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single(),
        }
    }

    #[test]
    fn test_order_row() {
        let row = OrderRow::from(&order());
        assert_eq!(row.total, "5.00");
        assert_eq!(row.item_count, 2);
        assert_eq!(row.placed_at, "2024-05-01 12:30 UTC");
        assert_eq!(row.items.first().map(|i| i.line_total.as_str()), Some("5.00"));
    }

    #[test]
    fn test_overflowing_line_total_renders_placeholder() {
        let item = OrderItem {
            product_id: "p1".to_string(),
            name: "Bulk".to_string(),
            price: Price::new(Decimal::MAX).unwrap_or_default(),
            quantity: 3,
        };
        assert_eq!(OrderItemRow::from(&item).line_total, "n/a");
    }

    #[test]
    fn test_status_options_mark_current() {
        let options = StatusOption::all(OrderStatus::Processing);
        let selected: Vec<_> = options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value)
            .collect();
        assert_eq!(options.len(), 4);
        assert_eq!(selected, vec!["processing"]);
    }
}
