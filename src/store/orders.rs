use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::StoreError;
use super::tx;

const ENTITY: &str = "order";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub payment_method: String,
    pub status: String,
    pub items_price: f64,
    pub tax_price: f64,
    pub shipping_price: f64,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Order placement request. Line prices come from the product rows at
/// insert time, never from the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrder {
    pub address: String,
    pub payment_method: String,
    #[serde(default)]
    pub tax_price: f64,
    #[serde(default)]
    pub shipping_price: f64,
    pub items: Vec<NewOrderItem>,
}

/// Full replacement of an order's mutable header fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderInput {
    pub address: String,
    pub payment_method: String,
    pub status: String,
    pub tax_price: f64,
    pub shipping_price: f64,
}

/// Sparse order header update; blank strings and zero amounts keep the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderPatch {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tax_price: Option<f64>,
    #[serde(default)]
    pub shipping_price: Option<f64>,
}

impl OrderPatch {
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            address: non_blank(self.address),
            payment_method: non_blank(self.payment_method),
            status: non_blank(self.status),
            tax_price: self.tax_price.filter(|v| *v != 0.0),
            shipping_price: self.shipping_price.filter(|v| *v != 0.0),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Order persistence. Every operation is scoped to the owning subject, so an
/// order belonging to someone else is indistinguishable from a missing one.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;
    async fn get_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderDetail, StoreError>;
    async fn create(&self, user_id: Uuid, order: &NewOrder) -> Result<Uuid, StoreError>;
    async fn replace_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: &OrderInput,
    ) -> Result<(), StoreError>;
    async fn merge_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        patch: &OrderPatch,
    ) -> Result<(), StoreError>;
    async fn delete_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<(), StoreError>;
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_ORDER: &str = r"
    SELECT order_id, user_id, address, payment_method, status, items_price,
           tax_price, shipping_price, total_price, created_at, updated_at
    FROM orders
";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at, order_id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))
    }

    async fn get_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderDetail, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER} WHERE user_id = $1 AND order_id = $2"
        ))
        .bind(user_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))?
        .ok_or_else(|| missing(user_id, order_id))?;

        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT order_item_id, order_id, product_id, quantity, unit_price, total_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))?;

        Ok(OrderDetail { order, items })
    }

    #[tracing::instrument(skip(self, order), fields(lines = order.items.len()), err)]
    async fn create(&self, user_id: Uuid, order: &NewOrder) -> Result<Uuid, StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = insert(&mut *tx, user_id, order).await;
        let id = tx::finish(tx, ENTITY, result).await?;

        tracing::info!(order_id = %id, "order created");
        Ok(id)
    }

    #[tracing::instrument(skip(self, input), err)]
    async fn replace_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: &OrderInput,
    ) -> Result<(), StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = replace(&mut *tx, user_id, order_id, input).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(%order_id, "order replaced");
        Ok(())
    }

    #[tracing::instrument(skip(self, patch), err)]
    async fn merge_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        patch: &OrderPatch,
    ) -> Result<(), StoreError> {
        let patch = patch.clone().normalized();
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = merge(&mut *tx, user_id, order_id, &patch).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(%order_id, "order patched");
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    async fn delete_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<(), StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = delete(&mut *tx, user_id, order_id).await;
        tx::finish(tx, ENTITY, result).await?;

        tracing::info!(%order_id, "order deleted");
        Ok(())
    }
}

/// Insert the header, price every line from its product row, then roll the
/// line totals up into the header. Any missing product aborts the whole order.
async fn insert(conn: &mut PgConnection, user_id: Uuid, order: &NewOrder) -> Result<Uuid, StoreError> {
    let order_id = sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO orders (order_id, user_id, address, payment_method, status,
                            tax_price, shipping_price, created_at, updated_at)
        VALUES (gen_random_uuid(), $1, $2, $3, 'pending', $4, $5,
                CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        RETURNING order_id
        ",
    )
    .bind(user_id)
    .bind(&order.address)
    .bind(&order.payment_method)
    .bind(order.tax_price)
    .bind(order.shipping_price)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?;

    for item in &order.items {
        sqlx::query_scalar::<_, Uuid>(
            r"
            INSERT INTO order_items (order_item_id, order_id, product_id, quantity,
                                     unit_price, total_price)
            SELECT gen_random_uuid(), $1, p.product_id, $3::INTEGER, p.price, p.price * $3::INTEGER
            FROM products p
            WHERE p.product_id = $2
            RETURNING order_item_id
            ",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StoreError::from_db(ENTITY, e))?
        .ok_or_else(|| {
            tracing::warn!(product_id = %item.product_id, "order references unknown product");
            StoreError::not_found("product", item.product_id)
        })?;
    }

    sqlx::query(
        r"
        UPDATE orders o
        SET items_price = s.items,
            total_price = s.items + o.tax_price + o.shipping_price
        FROM (SELECT COALESCE(SUM(total_price), 0) AS items
              FROM order_items WHERE order_id = $1) s
        WHERE o.order_id = $1
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?;

    Ok(order_id)
}

async fn replace(
    conn: &mut PgConnection,
    user_id: Uuid,
    order_id: Uuid,
    input: &OrderInput,
) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        UPDATE orders
        SET address = $1, payment_method = $2, status = $3,
            tax_price = $4, shipping_price = $5,
            total_price = items_price + $4 + $5,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $6 AND user_id = $7
        RETURNING order_id
        ",
    )
    .bind(&input.address)
    .bind(&input.payment_method)
    .bind(&input.status)
    .bind(input.tax_price)
    .bind(input.shipping_price)
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?
    .map(|_| ())
    .ok_or_else(|| missing(user_id, order_id))
}

async fn merge(
    conn: &mut PgConnection,
    user_id: Uuid,
    order_id: Uuid,
    patch: &OrderPatch,
) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        UPDATE orders
        SET address = COALESCE($1, address),
            payment_method = COALESCE($2, payment_method),
            status = COALESCE($3, status),
            tax_price = COALESCE($4, tax_price),
            shipping_price = COALESCE($5, shipping_price),
            total_price = items_price + COALESCE($4, tax_price) + COALESCE($5, shipping_price),
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $6 AND user_id = $7
        RETURNING order_id
        ",
    )
    .bind(patch.address.as_deref())
    .bind(patch.payment_method.as_deref())
    .bind(patch.status.as_deref())
    .bind(patch.tax_price)
    .bind(patch.shipping_price)
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?
    .map(|_| ())
    .ok_or_else(|| missing(user_id, order_id))
}

async fn delete(conn: &mut PgConnection, user_id: Uuid, order_id: Uuid) -> Result<(), StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        "DELETE FROM orders WHERE order_id = $1 AND user_id = $2 RETURNING order_id",
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))?
    .map(|_| ())
    .ok_or_else(|| missing(user_id, order_id))
}

fn missing(user_id: Uuid, order_id: Uuid) -> StoreError {
    tracing::warn!(%user_id, %order_id, "order not found");
    StoreError::not_found(ENTITY, order_id)
}
