//! Integration tests for Storedesk.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storedesk-integration-tests
//! ```
//!
//! Everything runs in-process against the in-memory identity provider and
//! document store; no Firebase project is needed.
//!
//! # Test Categories
//!
//! - `session_gate` - Sign-in, registration and access decisions
//! - `resource_views` - Store-scoped reads and writes
//! - `admin_http` - The back-office served over HTTP

#![allow(clippy::expect_used)]

use std::sync::Arc;

use serde_json::json;
use storedesk_admin::identity::{IdentityProvider, MemoryIdentity};
use storedesk_admin::routes;
use storedesk_admin::state::AppState;
use storedesk_admin::store::{Collection, DocumentStore, MemoryStore};
use tokio::task::JoinHandle;

/// Password shared by every seeded account.
pub const PASSWORD: &str = "correct-horse";

/// Store admin of `store-1`.
pub const ADMIN_EMAIL: &str = "ana@store-one.test";
/// Store admin of `store-2`.
pub const OTHER_ADMIN_EMAIL: &str = "bruno@store-two.test";
/// Shopper with a `CUSTOMER` role.
pub const CUSTOMER_EMAIL: &str = "carla@shopper.test";
/// Account with no authorization record.
pub const UNPROVISIONED_EMAIL: &str = "davi@nowhere.test";

/// Accounts for every seeded principal.
#[must_use]
pub fn seeded_identity() -> MemoryIdentity {
    MemoryIdentity::new()
        .with_account("admin-1", ADMIN_EMAIL, PASSWORD)
        .with_account("admin-2", OTHER_ADMIN_EMAIL, PASSWORD)
        .with_account("cust-1", CUSTOMER_EMAIL, PASSWORD)
        .with_account("nobody-1", UNPROVISIONED_EMAIL, PASSWORD)
}

/// Authorization records, two stores, and products and orders for both.
#[must_use]
pub fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with_document(
            Collection::Users,
            "admin-1",
            json!({"role": "STORE_ADMIN", "storeId": "store-1"}),
        )
        .with_document(
            Collection::Users,
            "admin-2",
            json!({"role": "STORE_ADMIN", "storeId": "store-2"}),
        )
        .with_document(Collection::Users, "cust-1", json!({"role": "CUSTOMER"}))
        .with_document(
            Collection::Stores,
            "store-1",
            json!({"name": "Store One", "address": "1 Main St", "phone": "555-0101"}),
        )
        .with_document(
            Collection::Stores,
            "store-2",
            json!({"name": "Store Two", "address": "2 High St", "phone": "555-0202"}),
        )
        .with_document(
            Collection::Products,
            "p1",
            json!({"name": "Mug", "description": "Ceramic", "price": 12.5, "storeId": "store-1"}),
        )
        .with_document(
            Collection::Products,
            "p2",
            json!({"name": "Poster", "description": "A2", "price": 20, "storeId": "store-2"}),
        )
        .with_document(
            Collection::Orders,
            "o1",
            json!({
                "storeId": "store-1",
                "userId": "cust-1",
                "userName": "Carla",
                "userEmail": CUSTOMER_EMAIL,
                "items": [{"productId": "p1", "name": "Mug", "price": 12.5, "quantity": 2}],
                "total": 25,
                "status": "pending",
                "createdAt": "2024-05-01T10:00:00Z"
            }),
        )
        .with_document(
            Collection::Orders,
            "o2",
            json!({
                "storeId": "store-2",
                "userId": "cust-1",
                "items": [],
                "total": 20,
                "status": "pending",
                "createdAt": "2024-05-02T10:00:00Z"
            }),
        )
}

/// Seeded identity provider, document store, and application state with a
/// running session gate.
pub struct TestContext {
    pub identity: Arc<MemoryIdentity>,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestContext {
    /// Build a context over the seeded fixtures and wait for the gate to settle.
    pub async fn new() -> Self {
        Self::with(seeded_identity(), seeded_store()).await
    }

    /// Build a context over the given fixtures and wait for the gate to settle.
    pub async fn with(identity: MemoryIdentity, store: MemoryStore) -> Self {
        let identity = Arc::new(identity);
        let store = Arc::new(store);
        let state = AppState::start(
            Arc::clone(&identity) as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        state.gate().settled().await;
        Self {
            identity,
            store,
            state,
        }
    }

    /// Sign in through the gate, panicking on provider errors.
    pub async fn sign_in(&self, email: &str) {
        let email = storedesk_core::Email::parse(email).expect("valid test email");
        self.state
            .gate()
            .sign_in(&email, PASSWORD)
            .await
            .expect("seeded credentials are valid");
    }

    /// Serve the application on an ephemeral local port.
    pub async fn serve(&self) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("bound listener has an address");
        let app = routes::app(self.state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        TestServer {
            base_url: format!("http://{addr}"),
            client: browser(),
            task: Some(task),
        }
    }
}

/// HTTP client that keeps its own session cookie and does not follow redirects.
fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.state.shutdown();
    }
}

/// A running back-office server. Stopped when the handle returned by
/// [`TestContext::serve`] is dropped.
///
/// `client` is one browser with its own cookie jar; [`TestServer::other_browser`]
/// gives another one against the same server.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// The same server as seen from a browser with an empty cookie jar.
    #[must_use]
    pub fn other_browser(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: browser(),
            task: None,
        }
    }

    /// GET `path`.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// POST a form to `path`.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
