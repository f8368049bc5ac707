pub mod bootstrap;
pub mod identities;
#[cfg(test)]
pub mod memory;
pub mod orders;
pub mod pool;
pub mod products;
pub mod tx;

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::token::TokenConfig;
use crate::config::Config;
use crate::service::orders::OrderService;
use crate::service::products::ProductService;
use crate::service::users::UserService;

use self::identities::{IdentityStore, PgIdentityStore};
use self::orders::PgOrderStore;
use self::products::PgProductStore;

/// Shared handles for every request. Stores are built once here and injected
/// into the services; nothing reaches the pool through a global.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub identities: Arc<dyn IdentityStore>,
    pub products: ProductService,
    pub orders: OrderService,
    pub users: UserService,
    pub tokens: Arc<TokenConfig>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let identities: Arc<dyn IdentityStore> = Arc::new(PgIdentityStore::new(pool.clone()));
        let tokens = Arc::new(TokenConfig::from_config(&config));

        Self {
            products: ProductService::new(Arc::new(PgProductStore::new(pool.clone()))),
            orders: OrderService::new(Arc::new(PgOrderStore::new(pool.clone()))),
            users: UserService::new(identities.clone(), tokens.clone()),
            identities,
            tokens,
            config: Arc::new(config),
            pool,
        }
    }
}

/// Failure from a persistence adapter. Every variant names the entity it
/// concerns so callers above the store can report it without re-wrapping.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} conflict: {reason}")]
    Conflict {
        entity: &'static str,
        reason: &'static str,
    },

    #[error("{entity} store failure: {source}")]
    Database {
        entity: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap a driver error, translating constraint violations that callers
    /// can act on.
    pub fn from_db(entity: &'static str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return Self::Conflict {
                        entity,
                        reason: "already exists",
                    };
                }
                Some("23503") => {
                    return Self::Conflict {
                        entity,
                        reason: "still referenced by another record",
                    };
                }
                _ => {}
            }
        }
        tracing::error!(entity, error = %err, "database error");
        Self::Database { entity, source: err }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
