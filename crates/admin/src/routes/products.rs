//! Product management route handlers.

use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use storedesk_core::ProductId;

use crate::{
    error::AppError,
    filters,
    gate::StoreAdmin,
    middleware::auth::RequireStoreAdmin,
    models::{NewProduct, Product, ProductPatch},
    state::AppState,
    views::{MutationError, ProductsView},
};

use super::{LOAD_FAILED, dashboard::AdminView, mutation_status, render};

/// Form input for creating/updating products.
#[derive(Debug, Deserialize)]
pub struct ProductFormInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
}

/// Product row for templates.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
        }
    }
}

/// Values shown in a product form.
#[derive(Debug, Clone, Default)]
pub struct ProductFormValues {
    pub name: String,
    pub description: String,
    pub price: String,
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
        }
    }
}

impl From<ProductFormInput> for ProductFormValues {
    fn from(input: ProductFormInput) -> Self {
        Self {
            name: input.name,
            description: input.description,
            price: input.price,
        }
    }
}

/// Product list page template (with the create form).
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub admin: AdminView,
    pub current_path: String,
    pub products: Vec<ProductRow>,
    pub form: ProductFormValues,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Product edit form template.
#[derive(Template)]
#[template(path = "products/edit.html")]
pub struct ProductEditTemplate {
    pub admin: AdminView,
    pub current_path: String,
    pub product_id: String,
    pub form: ProductFormValues,
    pub error: Option<String>,
}

fn index_page(
    admin: &StoreAdmin,
    view: &ProductsView,
    form: ProductFormValues,
    error: Option<String>,
    notice: Option<String>,
) -> ProductsIndexTemplate {
    ProductsIndexTemplate {
        admin: AdminView::from(admin),
        current_path: "/products".to_string(),
        products: view.snapshot().iter().map(ProductRow::from).collect(),
        form,
        error,
        notice,
    }
}

/// Render the list after a mutation, successful or not.
fn mutation_result(
    admin: &StoreAdmin,
    view: &ProductsView,
    result: Result<String, (MutationError, ProductFormValues)>,
) -> Response {
    match result {
        Ok(notice) => render(&index_page(
            admin,
            view,
            ProductFormValues::default(),
            None,
            Some(notice),
        ))
        .into_response(),
        Err((e, form)) => (
            mutation_status(&e),
            render(&index_page(admin, view, form, Some(e.user_message()), None)),
        )
            .into_response(),
    }
}

/// Products list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
) -> Response {
    match ProductsView::load(state.store(), admin.clone()).await {
        Ok(view) => render(&index_page(
            &admin,
            &view,
            ProductFormValues::default(),
            None,
            None,
        ))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load products");
            let view = ProductsView::open(state.store(), admin.clone());
            (
                StatusCode::BAD_GATEWAY,
                render(&index_page(
                    &admin,
                    &view,
                    ProductFormValues::default(),
                    Some(LOAD_FAILED.to_string()),
                    None,
                )),
            )
                .into_response()
        }
    }
}

/// Create product handler.
#[instrument(skip(admin, state, input), fields(name = %input.name))]
pub async fn create(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Form(input): Form<ProductFormInput>,
) -> Result<Response, AppError> {
    let mut view = ProductsView::load(state.store(), admin.clone()).await?;

    let result = match NewProduct::parse(&input.name, &input.description, &input.price) {
        Ok(candidate) => view.create(candidate).await,
        Err(e) => Err(MutationError::Invalid(e)),
    };

    let result = result
        .map(|id| {
            tracing::info!(product_id = %id, "Product created");
            "Product created.".to_string()
        })
        .map_err(|e| (e, ProductFormValues::from(input)));

    Ok(mutation_result(&admin, &view, result))
}

/// Edit product form handler.
#[instrument(skip(admin, state))]
pub async fn edit(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let view = ProductsView::load(state.store(), admin.clone()).await?;
    let product = view
        .find(&ProductId::new(id.clone()))
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let template = ProductEditTemplate {
        admin: AdminView::from(&admin),
        current_path: "/products".to_string(),
        product_id: id,
        form: ProductFormValues::from(product),
        error: None,
    };

    Ok(render(&template).into_response())
}

/// Update product handler.
#[instrument(skip(admin, state, input))]
pub async fn update(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(input): Form<ProductFormInput>,
) -> Result<Response, AppError> {
    let mut view = ProductsView::load(state.store(), admin.clone()).await?;
    let product_id = ProductId::new(id.clone());

    let result = match ProductPatch::parse(&input.name, &input.description, &input.price) {
        Ok(patch) => view.update(&product_id, patch).await,
        Err(e) => Err(MutationError::Invalid(e)),
    };

    match result {
        Ok(()) => {
            tracing::info!(product_id = %product_id, "Product updated");
            Ok(mutation_result(&admin, &view, Ok("Product updated.".to_string())))
        }
        Err(MutationError::OutOfScope { .. }) => Err(AppError::NotFound(format!("product {id}"))),
        Err(e @ MutationError::Refresh(_)) => Ok(mutation_result(
            &admin,
            &view,
            Err((e, ProductFormValues::default())),
        )),
        Err(e) => {
            let template = ProductEditTemplate {
                admin: AdminView::from(&admin),
                current_path: "/products".to_string(),
                product_id: id,
                form: ProductFormValues::from(input),
                error: Some(e.user_message()),
            };
            Ok((mutation_status(&e), render(&template)).into_response())
        }
    }
}

/// Delete product handler.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireStoreAdmin(admin): RequireStoreAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let mut view = ProductsView::load(state.store(), admin.clone()).await?;
    let product_id = ProductId::new(id);

    let result = view
        .delete(&product_id)
        .await
        .map(|()| {
            tracing::info!(product_id = %product_id, "Product deleted");
            "Product deleted.".to_string()
        })
        .map_err(|e| (e, ProductFormValues::default()));

    Ok(mutation_result(&admin, &view, result))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use storedesk_core::{Price, StoreId};

    use super::*;

    #[test]
    fn test_product_row_formats_price() {
        let product = Product {
            id: ProductId::new("p1"),
            name: "Widget".to_string(),
            description: String::new(),
            price: Price::new(Decimal::new(999, 2)).unwrap_or_default(),
            store_id: StoreId::new("store-1"),
        };
        let row = ProductRow::from(&product);
        assert_eq!(row.id, "p1");
        assert_eq!(row.price, "9.99");
    }

    #[test]
    fn test_form_values_keep_submitted_input() {
        let values = ProductFormValues::from(ProductFormInput {
            name: "Widget".to_string(),
            description: "Blue".to_string(),
            price: "abc".to_string(),
        });
        assert_eq!(values.price, "abc");
        assert_eq!(values.description, "Blue");
    }
}
