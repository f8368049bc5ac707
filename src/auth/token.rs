//! Signed, time-bounded credentials in JWT compact form (`header.payload.signature`).
//!
//! Only HMAC-SHA256 is ever produced or accepted. The algorithm named in a
//! presented token's header is checked against that fixed choice before the
//! signature is looked at, so a token cannot talk the verifier into `none` or
//! a different MAC.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Payload of a credential. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign credential: {0}")]
    Signing(&'static str),

    #[error("invalid credential signature")]
    InvalidSignature,

    #[error("credential expired")]
    Expired,

    #[error("credential not yet valid")]
    NotYetValid,

    #[error("malformed credential: {0}")]
    Malformed(&'static str),
}

/// Issue a credential for `subject_id` valid from `now` until `now + ttl`.
pub fn issue(
    subject_id: &str,
    role: &str,
    secret: &[u8],
    now: DateTime<Utc>,
    ttl: Duration,
    issuer: &str,
) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Signing("empty signing key"));
    }
    let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::Signing("ttl out of range"))?;
    let iat = now.timestamp();
    let claims = Claims {
        user_id: subject_id.to_owned(),
        role: role.to_owned(),
        iss: issuer.to_owned(),
        iat,
        nbf: iat,
        exp: iat
            .checked_add(ttl_secs)
            .ok_or(TokenError::Signing("ttl out of range"))?,
    };
    let header = Header {
        alg: ALGORITHM.to_owned(),
        typ: Some(TOKEN_TYPE.to_owned()),
    };

    let header_json =
        serde_json::to_vec(&header).map_err(|_| TokenError::Signing("header encoding"))?;
    let claims_json =
        serde_json::to_vec(&claims).map_err(|_| TokenError::Signing("claims encoding"))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(secret, signing_input.as_bytes())?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Check a credential's algorithm, signature and validity window at `now`.
///
/// The window is inclusive at both ends: `nbf <= now <= exp`.
pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed("expected three segments"));
    };

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| TokenError::Malformed("header is not base64url"))?;
    let header: Header = serde_json::from_slice(&header_json)
        .map_err(|_| TokenError::Malformed("header is not valid JSON"))?;
    if header.alg != ALGORITHM {
        tracing::warn!(alg = %header.alg, "rejected credential with unexpected algorithm");
        return Err(TokenError::InvalidSignature);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::InvalidSignature)?;
    let signing_input_len = header_b64.len() + 1 + claims_b64.len();
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidSignature)?;
    mac.update(&token.as_bytes()[..signing_input_len]);
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| TokenError::Malformed("claims are not base64url"))?;
    let claims: Claims = serde_json::from_slice(&claims_json)
        .map_err(|_| TokenError::Malformed("claims are not valid JSON"))?;

    let now = now.timestamp();
    if now < claims.nbf {
        return Err(TokenError::NotYetValid);
    }
    if now > claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn sign(secret: &[u8], input: &[u8]) -> Result<Vec<u8>, TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Signing("invalid key"))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Process-wide credential settings.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    pub ttl: Duration,
    pub issuer: String,
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl,
            config.token_issuer.clone(),
        )
    }

    pub fn issue(&self, subject_id: &str, role: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        issue(subject_id, role, &self.secret, now, self.ttl, &self.issuer)
    }

    /// Verify and additionally require that the credential was issued by us.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = verify(token, &self.secret, now)?;
        if claims.iss != self.issuer {
            return Err(TokenError::Malformed("unexpected issuer"));
        }
        Ok(claims)
    }
}
