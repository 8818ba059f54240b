//! Dashboard route handler.

use askama::Template;
use axum::response::Html;
use tracing::instrument;

use crate::{filters, gate::StoreAdmin, middleware::auth::RequireStoreAdmin};

use super::render;

/// Signed-in admin, as shown in the page header.
#[derive(Debug, Clone)]
pub struct AdminView {
    pub email: String,
    pub store_id: String,
}

impl From<&StoreAdmin> for AdminView {
    fn from(admin: &StoreAdmin) -> Self {
        Self {
            email: admin
                .email()
                .map_or_else(|| admin.principal().uid.to_string(), ToString::to_string),
            store_id: admin.store_id().to_string(),
        }
    }
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin: AdminView,
    pub current_path: String,
}

/// Dashboard handler.
#[instrument(skip(admin))]
pub async fn index(RequireStoreAdmin(admin): RequireStoreAdmin) -> Html<String> {
    render(&DashboardTemplate {
        admin: AdminView::from(&admin),
        current_path: "/".to_string(),
    })
}
