//! HTTP route handlers for the back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (session gate settled)
//!
//! # Dashboard
//! GET  /                       - Signed-in admin and store
//!
//! # Auth (email/password via the identity provider)
//! GET  /auth/login             - Login form
//! POST /auth/login             - Sign in
//! GET  /auth/register          - Registration form
//! POST /auth/register          - Create an account (no store access)
//! POST /auth/logout            - Sign out
//!
//! # Products
//! GET  /products               - Product list and create form
//! POST /products               - Create product
//! GET  /products/{id}/edit     - Edit form
//! POST /products/{id}          - Update product
//! POST /products/{id}/delete   - Delete product
//!
//! # Orders
//! GET  /orders                 - Order list with status controls
//! POST /orders/{id}/status     - Change order status
//!
//! # Store configuration
//! GET  /store                  - Store details
//! GET  /store/edit             - Edit form
//! POST /store                  - Save store details
//! ```

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod products;
pub mod store;

use askama::Template;
use axum::{
    Router,
    http::StatusCode,
    response::Html,
    routing::{get, post},
};

use crate::middleware::create_session_layer;
use crate::state::AppState;
use crate::views::MutationError;

/// Build the route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .merge(auth::router())
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/store", get(store::show).post(store::update))
        .route("/store/edit", get(store::edit))
}

/// Build the application: health checks plus all routes, bound to `state`
/// and wrapped in the session layer.
///
/// Tracing and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(routes())
        .layer(create_session_layer())
        .with_state(state)
}

/// Render a template, logging render failures.
pub(crate) fn render(template: &impl Template) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// Status for a page re-rendered after a failed mutation.
pub(crate) const fn mutation_status(error: &MutationError) -> StatusCode {
    match error {
        MutationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MutationError::OutOfScope { .. } => StatusCode::NOT_FOUND,
        MutationError::Write(_) => StatusCode::BAD_GATEWAY,
        MutationError::Refresh(_) => StatusCode::OK,
    }
}

/// Message for a list that could not be read.
pub(crate) const LOAD_FAILED: &str = "Could not load data from the store. Reload the page to try again.";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::identity::MemoryIdentity;
    use crate::store::{Collection, MemoryStore};

    async fn settled_state() -> AppState {
        let identity = Arc::new(MemoryIdentity::new().with_account(
            "admin-1",
            "ana@store-one.test",
            "correct-horse",
        ));
        let store = Arc::new(MemoryStore::new().with_document(
            Collection::Users,
            "admin-1",
            json!({"role": "STORE_ADMIN", "storeId": "store-1"}),
        ));
        let state = AppState::start(identity, store);
        state.gate().settled().await;
        state
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
        send(
            app(state.clone()),
            Request::get(uri).body(Body::empty()).unwrap(),
        )
        .await
    }

    /// Sign in through the login form and return the session cookie.
    async fn login_cookie(router: Router) -> String {
        let request = Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "email=ana%40store-one.test&password=correct-horse",
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.contains("SameSite=Strict"));
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let state = settled_state().await;
        assert_eq!(get(&state, "/health").await, (StatusCode::OK, "ok".to_string()));
        assert_eq!(get(&state, "/health/ready").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_fails_after_shutdown() {
        let state = settled_state().await;
        state.shutdown();
        tokio::task::yield_now().await;
        assert_eq!(
            get(&state, "/health/ready").await.0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_signed_out_gets_denied_placeholder() {
        let state = settled_state().await;
        let (status, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("You are not a store administrator."));
    }

    #[tokio::test]
    async fn test_dashboard_shows_admin_and_store() {
        let state = settled_state().await;
        let router = app(state.clone());
        let cookie = login_cookie(router.clone()).await;

        let request = Request::get("/")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ana@store-one.test"));
        assert!(body.contains("store-1"));
    }

    #[tokio::test]
    async fn test_grant_does_not_extend_to_other_browsers() {
        let state = settled_state().await;
        let router = app(state.clone());
        login_cookie(router.clone()).await;
        assert!(state.gate().access().granted().is_some());

        let (status, body) = send(router, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("You are not a store administrator."));
    }

    #[test]
    fn test_mutation_status() {
        let out_of_scope = MutationError::OutOfScope {
            resource: "product",
            id: "p9".to_string(),
        };
        assert_eq!(mutation_status(&out_of_scope), StatusCode::NOT_FOUND);
        assert_eq!(
            mutation_status(&MutationError::Invalid(
                crate::models::ValidationError::BlankName
            )),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
