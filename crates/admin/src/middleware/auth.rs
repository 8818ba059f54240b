//! Store admin extractor.
//!
//! The single capability check for HTTP handlers. While the session gate is
//! still loading, requests get a placeholder that refreshes itself; once it
//! has settled, anyone who is not a store admin gets the access denied
//! placeholder, whether or not they are signed in.
//!
//! The gate's grant is process-wide, so it only applies to the browser whose
//! session was marked at sign-in for that same grant.

use askama::Template;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{Html, IntoResponse, Response},
};

use tower_sessions::Session;

use crate::filters;
use crate::gate::{Access, StoreAdmin};
use crate::middleware::session::holds_grant;
use crate::state::AppState;

/// Seconds before the loading placeholder reloads itself.
const LOADING_RETRY_SECS: u32 = 1;

/// Extractor that requires a store admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireStoreAdmin(admin): RequireStoreAdmin) -> String {
///     format!("Managing {}", admin.store_id())
/// }
/// ```
pub struct RequireStoreAdmin(pub StoreAdmin);

/// Rejection from [`RequireStoreAdmin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRejection {
    /// The gate has not settled yet (503, auto-refresh).
    Loading,
    /// Not signed in, not a store admin, or a different browser (403).
    Denied,
}

/// Loading placeholder.
#[derive(Template)]
#[template(path = "gate/loading.html")]
struct LoadingTemplate {
    retry_secs: u32,
}

/// Access denied placeholder.
#[derive(Template)]
#[template(path = "gate/denied.html")]
struct DeniedTemplate;

impl IntoResponse for AccessRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Loading => {
                let body = LoadingTemplate {
                    retry_secs: LOADING_RETRY_SECS,
                }
                .render()
                .unwrap_or_else(|e| {
                    tracing::error!("Template render error: {}", e);
                    "Loading...".to_string()
                });
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, LOADING_RETRY_SECS.to_string())],
                    Html(body),
                )
                    .into_response()
            }
            Self::Denied => {
                let body = DeniedTemplate.render().unwrap_or_else(|e| {
                    tracing::error!("Template render error: {}", e);
                    "Access denied".to_string()
                });
                (StatusCode::FORBIDDEN, Html(body)).into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for RequireStoreAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AccessRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let admin = match state.gate().access() {
            Access::Granted(admin) => admin,
            Access::Loading => return Err(AccessRejection::Loading),
            Access::Denied => return Err(AccessRejection::Denied),
        };

        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            tracing::error!("Session layer missing, denying store admin access");
            return Err(AccessRejection::Denied);
        };

        if holds_grant(&session, &admin).await {
            Ok(Self(admin))
        } else {
            tracing::debug!("Request without the signed-in session, denying");
            Err(AccessRejection::Denied)
        }
    }
}
