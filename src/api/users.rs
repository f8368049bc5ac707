use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::extract::ValidJson;
use crate::auth::middleware::{AUTH_COOKIE, Principal, authenticate};
use crate::error::ApiError;
use crate::service::users::{LoginRequest, SignupRequest};
use crate::store::AppState;
use crate::store::identities::Subject;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/user/signup", post(signup))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route(
            "/user/me",
            get(me).route_layer(from_fn_with_state(state.clone(), authenticate)),
        )
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

fn auth_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{secure_flag}",
        max_age.as_secs()
    )
}

fn session_cookie(state: &AppState, token: &str) -> String {
    auth_cookie(token, state.tokens.ttl, state.config.secure_cookies)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, body), err)]
async fn signup(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.users.signup(&body).await?;
    let id = session.subject.user_id;

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, session_cookie(&state, &session.token))],
        Json(json!({
            "message": format!("User with id: {id} signed up successfully"),
            "user_id": id,
        })),
    ))
}

#[tracing::instrument(skip(state, body), err)]
async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.users.login(&body).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, session_cookie(&state, &session.token))],
        Json(session.subject),
    ))
}

/// Credentials are stateless, so logging out only tells the client to drop
/// the cookie.
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(SET_COOKIE, auth_cookie("", Duration::ZERO, state.config.secure_cookies))],
        Json(json!({ "message": "logged out" })),
    )
}

#[tracing::instrument(skip(state, principal), fields(subject_id = %principal.subject_id), err)]
async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<Subject>, ApiError> {
    Ok(Json(state.users.get(principal.subject_id).await?))
}
