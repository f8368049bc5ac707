pub mod extract;
pub mod orders;
pub mod products;
pub mod users;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::store::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/healthz", get(healthz))
        .merge(products::router(state))
        .merge(users::router(state))
        .merge(orders::router(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Liveness plus a database round trip.
async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("database unreachable: {e}")))?;
    Ok(Json(json!({ "status": "ok", "database": "ok" })))
}
