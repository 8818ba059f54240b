//! HTTP middleware and extractors for the back-office.
//!
//! # Layers (outermost first, see `main.rs`)
//!
//! 1. Sentry (`NewSentryLayer`, `SentryHttpLayer`)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Session (`SessionManagerLayer`, added by `routes::app`)
//!
//! Access control is not a layer: handlers that touch store data take a
//! [`RequireStoreAdmin`] extractor, which consults the session gate and the
//! browser's session.

pub mod auth;
pub mod session;

pub use auth::{AccessRejection, RequireStoreAdmin};
pub use session::create_session_layer;
