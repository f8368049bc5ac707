//! Validation in front of the stores. Services hold no I/O logic of their own:
//! they check the request, make a best-effort existence check before a
//! mutation, and delegate.

pub mod orders;
pub mod products;
pub mod users;

use crate::error::ApiError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("price must be greater than zero")]
    InvalidPrice,

    #[error("stock cannot be negative")]
    InvalidStock,

    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    #[error("status must be one of: {}", orders::ORDER_STATUSES.join(", "))]
    InvalidStatus,

    #[error("tax and shipping charges cannot be negative")]
    InvalidCharge,

    #[error("{0}")]
    InvalidField(String),

    #[error("email is already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidPrice
            | ServiceError::InvalidStock
            | ServiceError::InvalidQuantity
            | ServiceError::InvalidStatus
            | ServiceError::InvalidCharge
            | ServiceError::InvalidField(_) => Self::BadRequest(err.to_string()),
            ServiceError::EmailTaken => Self::Conflict(err.to_string()),
            ServiceError::InvalidCredentials => Self::Unauthorized,
            ServiceError::Store(StoreError::NotFound { entity, .. }) => {
                Self::NotFound(format!("{entity} not found"))
            }
            ServiceError::Store(e @ StoreError::Conflict { .. }) => Self::Conflict(e.to_string()),
            ServiceError::Store(e @ StoreError::Database { .. }) => {
                Self::Internal(anyhow::Error::new(e))
            }
            ServiceError::Internal(e) => Self::Internal(e),
        }
    }
}
