use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::role::Role;
use crate::auth::token::{TokenConfig, TokenError};
use crate::error::ApiError;
use crate::store::identities::IdentityStore;
use crate::store::{AppState, StoreError};

/// Name of the cookie that carries the credential.
pub const AUTH_COOKIE: &str = "Authorization";

/// Verified caller attached to the request by [`authenticate`].
///
/// `role` is the role stored for the subject at the time of this request, not
/// the one embedded in the credential, so demotions take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn require_catalog_admin(&self) -> Result<(), ApiError> {
        if self.role.can_manage_catalog() {
            Ok(())
        } else {
            tracing::warn!(subject_id = %self.subject_id, role = %self.role, "catalog change denied");
            Err(ApiError::Forbidden)
        }
    }
}

/// Handlers take `Principal` as an argument. If the gate did not run for the
/// route the extension is absent and the request is refused.
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credential presented")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("credential subject no longer exists")]
    UnknownSubject,

    #[error(transparent)]
    Store(StoreError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => Self::Internal(anyhow::Error::new(e)),
            AuthError::MissingToken | AuthError::Token(_) | AuthError::UnknownSubject => {
                Self::Unauthorized
            }
        }
    }
}

/// Turn a presented credential into a [`Principal`]: verify it, then look the
/// subject up again. A subject deleted since issue is refused even though the
/// signature still checks out.
pub async fn verify_principal(
    identities: &dyn IdentityStore,
    tokens: &TokenConfig,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    let claims = tokens.verify(token, now)?;
    let subject_id = Uuid::parse_str(&claims.user_id)
        .map_err(|_| AuthError::Token(TokenError::Malformed("subject is not a uuid")))?;

    let subject = match identities.get_by_id(subject_id).await {
        Ok(subject) => subject,
        Err(e) if e.is_not_found() => return Err(AuthError::UnknownSubject),
        Err(e) => return Err(AuthError::Store(e)),
    };

    Ok(Principal {
        subject_id: subject.user_id,
        role: subject.role,
        issued_at: claims.issued_at(),
        expires_at: claims.expires_at(),
    })
}

/// Auth gate. Mount with `route_layer(from_fn_with_state(state, authenticate))`.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_auth_cookie(req.headers());
    let principal = verify_principal(
        state.identities.as_ref(),
        &state.tokens,
        token.as_deref(),
        Utc::now(),
    )
    .await
    .map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "request not authenticated");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub fn extract_auth_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}
