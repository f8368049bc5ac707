use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::StoreError;
use super::tx;

const ENTITY: &str = "product";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully specified product, used for create and full replace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i32,
}

/// Sparse product update. An absent field, an empty string, or a numeric
/// zero all mean "keep the stored value".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock: Option<i32>,
}

impl ProductPatch {
    /// Fold zero-value sentinels into `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.filter(|v| !v.is_empty()),
            description: self.description.filter(|v| !v.is_empty()),
            price: self.price.filter(|v| *v != 0.0),
            stock: self.stock.filter(|v| *v != 0),
        }
    }

    pub fn is_noop(&self) -> bool {
        let n = self.clone().normalized();
        n.name.is_none() && n.description.is_none() && n.price.is_none() && n.stock.is_none()
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Product, StoreError>;
    async fn create(&self, input: &ProductInput) -> Result<Uuid, StoreError>;
    async fn replace_by_id(&self, id: Uuid, input: &ProductInput) -> Result<(), StoreError>;
    async fn merge_by_id(&self, id: Uuid, patch: &ProductPatch) -> Result<(), StoreError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError>;
}

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        sqlx::query_as::<_, Product>(
            r"
            SELECT product_id, name, description, price, stock, created_at, updated_at
            FROM products
            ORDER BY created_at, product_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Product, StoreError> {
        sqlx::query_as::<_, Product>(
            r"
            SELECT product_id, name, description, price, stock, created_at, updated_at
            FROM products
            WHERE product_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))?
        .ok_or_else(|| {
            tracing::warn!(product_id = %id, "product not found");
            StoreError::not_found(ENTITY, id)
        })
    }

    #[tracing::instrument(skip(self, input), err)]
    async fn create(&self, input: &ProductInput) -> Result<Uuid, StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = insert(&mut *tx, input).await;
        let id = tx::finish(tx, ENTITY, result).await?;

        tracing::info!(product_id = %id, "product created");
        Ok(id)
    }

    #[tracing::instrument(skip(self, input), err)]
    async fn replace_by_id(&self, id: Uuid, input: &ProductInput) -> Result<(), StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = replace(&mut *tx, id, input).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(product_id = %id, "product replaced");
        Ok(())
    }

    #[tracing::instrument(skip(self, patch), err)]
    async fn merge_by_id(&self, id: Uuid, patch: &ProductPatch) -> Result<(), StoreError> {
        let patch = patch.clone().normalized();
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = merge(&mut *tx, id, &patch).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(product_id = %id, "product patched");
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = delete(&mut *tx, id).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

async fn insert(conn: &mut PgConnection, input: &ProductInput) -> Result<Uuid, StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO products (product_id, name, description, price, stock, created_at, updated_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        RETURNING product_id
        ",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock)
    .fetch_one(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))
}

// The RETURNING row is the existence proof: no row back means no row matched.
async fn replace(conn: &mut PgConnection, id: Uuid, input: &ProductInput) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        UPDATE products
        SET name = $1, description = $2, price = $3, stock = $4,
            updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $5
        RETURNING product_id
        ",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock)
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?
    .map(|_| ())
    .ok_or_else(|| missing(id))
}

// Merge happens inside the UPDATE itself, so concurrent patches never read a
// stale row before writing.
async fn merge(conn: &mut PgConnection, id: Uuid, patch: &ProductPatch) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        UPDATE products
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            price = COALESCE($3, price),
            stock = COALESCE($4, stock),
            updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $5
        RETURNING product_id
        ",
    )
    .bind(patch.name.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.price)
    .bind(patch.stock)
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?
    .map(|_| ())
    .ok_or_else(|| missing(id))
}

async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>("DELETE FROM products WHERE product_id = $1 RETURNING product_id")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))?
        .map(|_| ())
        .ok_or_else(|| missing(id))
}

fn missing(id: Uuid) -> StoreError {
    tracing::warn!(product_id = %id, "product not found");
    StoreError::not_found(ENTITY, id)
}
