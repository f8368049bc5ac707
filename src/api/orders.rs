use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use super::extract::{ValidJson, ValidPath};
use crate::auth::middleware::{Principal, authenticate};
use crate::error::ApiError;
use crate::store::AppState;
use crate::store::orders::{NewOrder, Order, OrderDetail, OrderInput, OrderPatch};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(get_order)
                .put(replace_order)
                .patch(merge_order)
                .delete(delete_order),
        )
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}

#[tracing::instrument(skip(state, principal), fields(subject_id = %principal.subject_id), err)]
async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list(&principal).await?))
}

#[tracing::instrument(skip(state, principal), fields(subject_id = %principal.subject_id), err)]
async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<OrderDetail>, ApiError> {
    Ok(Json(state.orders.get(&principal, id).await?))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(body): ValidJson<NewOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.orders.create(&principal, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Order with id: {id} placed successfully"),
            "order_id": id,
        })),
    ))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn replace_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(body): ValidJson<OrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    state.orders.replace(&principal, id, &body).await?;
    Ok(Json(json!({ "message": format!("Order with id: {id} updated successfully") })))
}

#[tracing::instrument(skip(state, principal, body), fields(subject_id = %principal.subject_id), err)]
async fn merge_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(body): ValidJson<OrderPatch>,
) -> Result<impl IntoResponse, ApiError> {
    state.orders.merge(&principal, id, &body).await?;
    Ok(Json(json!({ "message": format!("Order with id: {id} updated successfully") })))
}

#[tracing::instrument(skip(state, principal), fields(subject_id = %principal.subject_id), err)]
async fn delete_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.orders.delete(&principal, id).await?;
    Ok(Json(json!({ "message": format!("Order with id: {id} deleted successfully") })))
}
