//! Health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Ready once the session gate is running and has evaluated the identity
/// provider's first notification.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let gate = state.gate();
    if gate.is_running() && !gate.snapshot().loading {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
