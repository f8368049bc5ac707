pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod validation;

use std::any::Any;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::store::AppState;

/// The complete HTTP application: routes plus the server-wide layers.
///
/// Layers from outermost: request tracing, panic recovery, timeout. A handler
/// that outlives the timeout is dropped and the client gets a 504; any
/// database work it started is left to the driver.
pub fn app(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;
    let max_body_bytes = state.config.max_body_bytes;

    with_server_layers(
        api::router(&state).with_state(state),
        request_timeout,
        max_body_bytes,
    )
}

fn with_server_layers(router: Router, request_timeout: Duration, max_body_bytes: usize) -> Router {
    router.layer(DefaultBodyLimit::max(max_body_bytes)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("request timed out");
        ApiError::Timeout
    } else {
        ApiError::Internal(anyhow::anyhow!("unhandled middleware error: {err}"))
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".into());
    ApiError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
