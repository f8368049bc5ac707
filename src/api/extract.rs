use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::error::ApiError;

/// JSON body extractor with client-facing error messages.
///
/// Decoding failures are split into incomplete bodies, syntax errors and type
/// mismatches. Request types deny unknown fields, so a stray key lands in the
/// type-mismatch bucket. Bodies over the router's `DefaultBodyLimit` become
/// `413`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::Malformed(rejection.body_text())
            }
        })?;
        decode(&bytes).map(Self)
    }
}

/// Path parameter extractor. A segment that does not parse is a JSON `400`
/// with a fixed message; the parser's own text only goes to the log.
#[derive(Debug, Clone, Copy)]
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) if rejection.status().is_server_error() => Err(ApiError::Internal(
                anyhow::anyhow!("path extraction failed: {}", rejection.body_text()),
            )),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "rejected path parameter");
                Err(ApiError::BadRequest("invalid id".into()))
            }
        }
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|err| {
        tracing::debug!(error = %err, "rejected request body");
        let message = match err.classify() {
            Category::Eof => "request body is incomplete".to_owned(),
            Category::Syntax => format!(
                "malformed JSON syntax at line {} column {}",
                err.line(),
                err.column()
            ),
            Category::Data => format!("incorrect data type in JSON: {err}"),
            Category::Io => "failed to read request body".to_owned(),
        };
        ApiError::Malformed(message)
    })
}
