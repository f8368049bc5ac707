use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::ServiceError;
use crate::auth::password;
use crate::auth::role::Role;
use crate::auth::token::TokenConfig;
use crate::store::StoreError;
use crate::store::identities::{IdentityStore, NewSubject, Subject};
use crate::validation;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A subject together with a freshly issued credential for it.
pub struct Session {
    pub subject: Subject,
    pub token: String,
}

#[derive(Clone)]
pub struct UserService {
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<TokenConfig>,
}

impl UserService {
    pub fn new(identities: Arc<dyn IdentityStore>, tokens: Arc<TokenConfig>) -> Self {
        Self { identities, tokens }
    }

    /// Register a new subject with role `user` and sign them in.
    #[tracing::instrument(skip(self, req), fields(email = %req.email), err)]
    pub async fn signup(&self, req: &SignupRequest) -> Result<Session, ServiceError> {
        let email = normalize_email(&req.email);
        validation::check_length("name", req.name.trim(), 1, 255)?;
        validation::check_email(&email)?;
        validation::check_password(&req.password)?;

        match self.identities.get_by_email(&email).await {
            Ok(_) => return Err(ServiceError::EmailTaken),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = password::hash_password(&req.password)?;
        let id = self
            .identities
            .create(&NewSubject {
                name: req.name.trim().to_owned(),
                email,
                password_hash,
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent signup for the same address
                StoreError::Conflict { .. } => ServiceError::EmailTaken,
                other => other.into(),
            })?;

        let subject = self.identities.get_by_id(id).await?;
        let token = self.issue(&subject)?;
        Ok(Session { subject, token })
    }

    /// Check credentials. Unknown email and wrong password are reported the
    /// same way and cost the same argon2 work.
    #[tracing::instrument(skip(self, req), fields(email = %req.email), err)]
    pub async fn login(&self, req: &LoginRequest) -> Result<Session, ServiceError> {
        let email = normalize_email(&req.email);
        let subject = match self.identities.get_by_email(&email).await {
            Ok(subject) => Some(subject),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let hash = subject
            .as_ref()
            .map_or(password::dummy_hash(), |s| s.password_hash.as_str());
        let valid = password::verify_password(&req.password, hash).unwrap_or_else(|e| {
            tracing::error!(error = %e, "stored password hash could not be parsed");
            false
        });

        match subject {
            Some(subject) if valid => {
                let token = self.issue(&subject)?;
                tracing::info!(user_id = %subject.user_id, "user logged in");
                Ok(Session { subject, token })
            }
            _ => Err(ServiceError::InvalidCredentials),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Subject, ServiceError> {
        Ok(self.identities.get_by_id(id).await?)
    }

    fn issue(&self, subject: &Subject) -> Result<String, ServiceError> {
        self.tokens
            .issue(&subject.user_id.to_string(), subject.role.as_str(), Utc::now())
            .map_err(|e| ServiceError::Internal(e.into()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
