//! Store configuration route handlers.
//!
//! The configuration document is provisioned outside the back-office; these
//! pages only show and edit an existing one.

use askama::Template;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    error::AppError,
    filters,
    gate::StoreAdmin,
    middleware::auth::RequireStoreAdmin,
    models::StoreProfile,
    state::AppState,
    views::StoreConfigView,
};

use super::{dashboard::AdminView, mutation_status, render};

const NOT_CONFIGURED: &str = "Your store configuration has not been set up yet.";

/// Form input for store details.
#[derive(Debug, Deserialize)]
pub struct StoreFormInput {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

/// Store details page template.
#[derive(Template)]
#[template(path = "store/show.html")]
pub struct StoreShowTemplate {
    pub admin: AdminView,
    pub current_path: String,
    pub profile: Option<StoreProfile>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Store details edit form template.
#[derive(Template)]
#[template(path = "store/edit.html")]
pub struct StoreEditTemplate {
    pub admin: AdminView,
    pub current_path: String,
    pub form: StoreProfile,
    pub error: Option<String>,
}

fn show_page(
    admin: &StoreAdmin,
    profile: Option<StoreProfile>,
    error: Option<String>,
    notice: Option<String>,
) -> StoreShowTemplate {
    StoreShowTemplate {
        admin: AdminView::from(admin),
        current_path: "/store".to_string(),
        profile,
        error,
        notice,
    }
}

/// Store details handler.
#[instrument(skip(admin, state))]
pub async fn show(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let view = StoreConfigView::load(state.store(), admin.clone()).await?;
    Ok(render(&show_page(&admin, view.into_snapshot(), None, None)).into_response())
}

/// Store details edit form handler.
#[instrument(skip(admin, state))]
pub async fn edit(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let view = StoreConfigView::load(state.store(), admin.clone()).await?;

    let Some(profile) = view.into_snapshot() else {
        return Ok((
            StatusCode::NOT_FOUND,
            render(&show_page(&admin, None, Some(NOT_CONFIGURED.to_string()), None)),
        )
            .into_response());
    };

    let template = StoreEditTemplate {
        admin: AdminView::from(&admin),
        current_path: "/store".to_string(),
        form: profile,
        error: None,
    };

    Ok(render(&template).into_response())
}

/// Save store details handler.
#[instrument(skip(admin, state, input))]
pub async fn update(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Form(input): Form<StoreFormInput>,
) -> Result<Response, AppError> {
    let mut view = StoreConfigView::load(state.store(), admin.clone()).await?;
    let profile = StoreProfile::new(&input.name, &input.address, &input.phone);

    match view.update(profile.clone()).await {
        Ok(()) => {
            tracing::info!(store_id = %admin.store_id(), "Store details saved");
            Ok(render(&show_page(
                &admin,
                view.into_snapshot(),
                None,
                Some("Store details saved.".to_string()),
            ))
            .into_response())
        }
        Err(e) => {
            let template = StoreEditTemplate {
                admin: AdminView::from(&admin),
                current_path: "/store".to_string(),
                form: profile,
                error: Some(e.user_message()),
            };
            Ok((mutation_status(&e), render(&template)).into_response())
        }
    }
}
