//! Authentication route handlers.
//!
//! Email/password sign-in and registration at the identity provider. Signing
//! in only gets an account into the back-office once the session gate has
//! found a store admin authorization record for it; registration never does.
//!
//! Valid credentials always redirect to the dashboard, which shows the access
//! denied placeholder to accounts without a grant. The login form itself only
//! reports credential and provider errors.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use storedesk_core::Email;

use crate::filters;
use crate::gate::Access;
use crate::identity::IdentityError;
use crate::middleware::session::{holds_grant, mark_signed_in};
use crate::state::AppState;

/// Shown when the browser session could not be marked after sign-in.
const SESSION_FAILED_MESSAGE: &str = "Could not start your session. Please try again.";

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/register", get(register_page).post(register))
        .route("/auth/logout", post(logout))
}

// =============================================================================
// Forms
// =============================================================================

/// Email and password form.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

/// Query parameters for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub registered: bool,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub email: String,
    pub error: Option<String>,
}

// =============================================================================
// Login
// =============================================================================

/// Display the login page.
///
/// GET /auth/login
async fn login_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Access::Granted(admin) = state.gate().access()
        && holds_grant(&session, &admin).await
    {
        return Redirect::to("/").into_response();
    }

    LoginTemplate {
        email: String::new(),
        error: None,
        notice: query.registered.then(|| {
            "Account created. An administrator must grant store access before you can sign in."
                .to_string()
        }),
    }
    .into_response()
}

/// Handle login form submission.
///
/// POST /auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            return login_failed(form.email, StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
    };

    match state.gate().sign_in(&email, &form.password).await {
        Ok(_) => match state.gate().access() {
            Access::Granted(admin) => {
                if let Err(e) = mark_signed_in(&session, &admin).await {
                    tracing::error!(error = %e, "Failed to mark session as signed in");
                    return login_failed(
                        form.email,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        SESSION_FAILED_MESSAGE.to_string(),
                    );
                }
                tracing::info!(store_id = %admin.store_id(), "Store admin signed in");
                Redirect::to("/").into_response()
            }
            Access::Denied | Access::Loading => {
                tracing::info!("Signed in without store access");
                Redirect::to("/").into_response()
            }
        },
        Err(e) => {
            let status = identity_status(&e);
            if e.is_service_error() {
                tracing::error!(error = %e, "Sign-in failed");
            } else {
                tracing::warn!(error = %e, "Sign-in rejected");
            }
            login_failed(form.email, status, e.user_message())
        }
    }
}

fn login_failed(email: String, status: StatusCode, error: String) -> Response {
    (
        status,
        LoginTemplate {
            email,
            error: Some(error),
            notice: None,
        },
    )
        .into_response()
}

// =============================================================================
// Registration
// =============================================================================

/// Display the registration page.
///
/// GET /auth/register
async fn register_page() -> impl IntoResponse {
    RegisterTemplate {
        email: String::new(),
        error: None,
    }
}

/// Handle registration form submission.
///
/// POST /auth/register
#[instrument(skip(state, form), fields(email = %form.email))]
async fn register(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            return register_failed(form.email, StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
    };

    match state.gate().register(&email, &form.password).await {
        Ok(principal) => {
            tracing::info!(uid = %principal.uid, "Account registered");
            Redirect::to("/auth/login?registered=true").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            register_failed(form.email, identity_status(&e), e.user_message())
        }
    }
}

fn register_failed(email: String, status: StatusCode, error: String) -> Response {
    (
        status,
        RegisterTemplate {
            email,
            error: Some(error),
        },
    )
        .into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and return to the login page.
///
/// Only the browser that signed in can sign the gate out; any other browser
/// just loses its own session.
///
/// POST /auth/logout
async fn logout(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    if let Access::Granted(admin) = state.gate().access()
        && holds_grant(&session, &admin).await
    {
        state.gate().sign_out().await;
    }
    if let Err(e) = session.flush().await {
        tracing::warn!(error = %e, "Failed to flush session on logout");
    }
    Redirect::to("/auth/login")
}

const fn identity_status(error: &IdentityError) -> StatusCode {
    match error {
        IdentityError::Provider(_) | IdentityError::Http(_) => StatusCode::BAD_GATEWAY,
        IdentityError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        IdentityError::EmailExists => StatusCode::CONFLICT,
        IdentityError::InvalidEmail(_) | IdentityError::WeakPassword(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        IdentityError::InvalidCredentials
        | IdentityError::UserDisabled
        | IdentityError::SessionExpired => StatusCode::UNAUTHORIZED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_status() {
        assert_eq!(
            identity_status(&IdentityError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identity_status(&IdentityError::EmailExists),
            StatusCode::CONFLICT
        );
        assert_eq!(
            identity_status(&IdentityError::Provider("INTERNAL".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_login_page_shows_registration_notice() {
        let html = LoginTemplate {
            email: String::new(),
            error: None,
            notice: Some("Account created.".to_string()),
        }
        .render()
        .unwrap_or_default();
        assert!(html.contains("Account created."));
    }
}
