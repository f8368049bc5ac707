#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use storefront::config::Config;
use storefront::store::AppState;

pub const ADMIN_EMAIL: &str = "admin@storefront.test";
pub const ADMIN_PASSWORD: &str = "testpassword";
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn test_config() -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        database_url: "postgres://localhost/test".into(),
        db_max_connections: 5,
        jwt_secret: "integration-test-secret".into(),
        token_ttl: Duration::from_secs(900),
        token_issuer: "ecom".into(),
        secure_cookies: false,
        request_timeout: Duration::from_secs(15),
        shutdown_grace: Duration::from_secs(1),
        max_body_bytes: MAX_BODY_BYTES,
        admin_email: Some(ADMIN_EMAIL.into()),
        admin_password: Some(ADMIN_PASSWORD.into()),
    }
}

/// Build a test `AppState` from the given pool.
///
/// Seeds the admin account (`ADMIN_EMAIL` / `ADMIN_PASSWORD`).
pub async fn test_state(pool: PgPool) -> AppState {
    storefront::store::bootstrap::run(&pool, Some(ADMIN_EMAIL), Some(ADMIN_PASSWORD))
        .await
        .expect("bootstrap failed");
    AppState::new(pool, test_config())
}

/// Build the full application, layers included.
pub fn test_router(state: AppState) -> Router {
    storefront::app(state)
}

pub async fn test_app(pool: PgPool) -> Router {
    test_router(test_state(pool).await)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Login as the bootstrap admin. Returns the credential from the cookie.
pub async fn admin_login(app: &Router) -> String {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Login and return the credential, failing the test on anything but 200.
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body, headers) = send(
        app,
        Method::POST,
        "",
        "/user/login",
        Some(serde_json::json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    auth_cookie(&headers).expect("login response missing Authorization cookie")
}

/// Sign up a regular user. Returns `(user_id, token)`.
pub async fn signup(app: &Router, name: &str, email: &str) -> (Uuid, String) {
    let (status, body, headers) = send(
        app,
        Method::POST,
        "",
        "/user/signup",
        Some(serde_json::json!({ "name": name, "email": email, "password": "testpass123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    let user_id = Uuid::parse_str(body["user_id"].as_str().unwrap()).unwrap();
    let token = auth_cookie(&headers).expect("signup response missing Authorization cookie");
    (user_id, token)
}

/// Pull the credential out of a `Set-Cookie: Authorization=...` header.
pub fn auth_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("Authorization="))
        .and_then(|rest| rest.split(';').next())
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create a product as admin. Returns its id.
pub async fn create_product(app: &Router, admin_token: &str, name: &str, price: f64, stock: i32) -> Uuid {
    let (status, body) = post_json(
        app,
        admin_token,
        "/products",
        serde_json::json!({
            "name": name,
            "description": format!("{name} description"),
            "price": price,
            "stock": stock,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
    Uuid::parse_str(body["product_id"].as_str().unwrap()).unwrap()
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send a request carrying the credential cookie (when `token` is non-empty)
/// and an optional JSON body.
pub async fn send(
    app: &Router,
    method: Method,
    token: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value, HeaderMap) {
    let body = body.map(|b| serde_json::to_vec(&b).unwrap());
    send_raw(app, method, token, path, body).await
}

/// Like [`send`], with the body bytes passed through untouched.
pub async fn send_raw(
    app: &Router,
    method: Method,
    token: &str,
    path: &str,
    body: Option<Vec<u8>>,
) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder().method(method).uri(path);
    if !token.is_empty() {
        builder = builder.header(COOKIE, format!("Authorization={token}"));
    }
    let req = match body {
        Some(bytes) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = body_json(resp).await;
    (status, body, headers)
}

pub async fn get_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let (status, body, _) = send(app, Method::GET, token, path, None).await;
    (status, body)
}

pub async fn post_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let (status, body, _) = send(app, Method::POST, token, path, Some(body)).await;
    (status, body)
}

pub async fn put_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let (status, body, _) = send(app, Method::PUT, token, path, Some(body)).await;
    (status, body)
}

pub async fn patch_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let (status, body, _) = send(app, Method::PATCH, token, path, Some(body)).await;
    (status, body)
}

pub async fn delete_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let (status, body, _) = send(app, Method::DELETE, token, path, None).await;
    (status, body)
}

/// Extract JSON body from a response.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
