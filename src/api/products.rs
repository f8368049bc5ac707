use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use super::extract::{ValidJson, ValidPath};
use crate::auth::middleware::{Principal, authenticate};
use crate::error::ApiError;
use crate::store::AppState;
use crate::store::products::{Product, ProductInput, ProductPatch};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Reads are public; the gate only wraps the mutating methods, which are
/// registered before `route_layer`.
pub fn router(state: &AppState) -> Router<AppState> {
    let auth = from_fn_with_state(state.clone(), authenticate);
    Router::new()
        .route(
            "/products",
            post(create_product)
                .route_layer(auth.clone())
                .get(list_products),
        )
        .route(
            "/products/{id}",
            put(replace_product)
                .patch(merge_product)
                .delete(delete_product)
                .route_layer(auth)
                .get(get_product),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state), err)]
async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.products.list().await?))
}

#[tracing::instrument(skip(state), err)]
async fn get_product(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.products.get(id).await?))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn create_product(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(body): ValidJson<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_catalog_admin()?;
    let id = state.products.create(&body).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Product with id: {id} added successfully"),
            "product_id": id,
        })),
    ))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn replace_product(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(body): ValidJson<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_catalog_admin()?;
    state.products.replace(id, &body).await?;
    Ok(updated(id))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn merge_product(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(body): ValidJson<ProductPatch>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_catalog_admin()?;
    state.products.merge(id, &body).await?;
    Ok(updated(id))
}

#[tracing::instrument(skip(state, principal), fields(subject_id = %principal.subject_id), err)]
async fn delete_product(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_catalog_admin()?;
    state.products.delete(id).await?;
    Ok(Json(json!({
        "message": format!("Product with id: {id} deleted successfully"),
    })))
}

fn updated(id: Uuid) -> Json<serde_json::Value> {
    Json(json!({ "message": format!("Product with id: {id} updated successfully") }))
}
