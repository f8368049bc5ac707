use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::StoreError;
use super::tx;
use crate::auth::role::Role;

const ENTITY: &str = "user";

/// Stored account. `password_hash` is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    user_id: Uuid,
    name: String,
    email: String,
    password: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubjectRow> for Subject {
    type Error = StoreError;

    fn try_from(row: SubjectRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e: anyhow::Error| {
            tracing::error!(user_id = %row.user_id, error = %e, "stored role is not recognised");
            StoreError::Database {
                entity: ENTITY,
                source: sqlx::Error::Decode(e.into()),
            }
        })?;
        Ok(Self {
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            password_hash: row.password,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Subject persistence as seen by the auth gate and the user service.
///
/// After `create` returns, `get_by_id` and `get_by_email` for that subject
/// succeed: the insert is committed before the id is handed back.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Subject, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Subject, StoreError>;
    async fn create(&self, subject: &NewSubject) -> Result<Uuid, StoreError>;
}

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_SUBJECT: &str =
    "SELECT user_id, name, email, password, role, created_at, updated_at FROM users";

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn get_by_email(&self, email: &str) -> Result<Subject, StoreError> {
        let row = sqlx::query_as::<_, SubjectRow>(&format!("{SELECT_SUBJECT} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(ENTITY, e))?
            .ok_or_else(|| StoreError::not_found(ENTITY, email))?;
        row.try_into()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Subject, StoreError> {
        let row = sqlx::query_as::<_, SubjectRow>(&format!("{SELECT_SUBJECT} WHERE user_id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_db(ENTITY, e))?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, subject), fields(email = %subject.email), err)]
    async fn create(&self, subject: &NewSubject) -> Result<Uuid, StoreError> {
        let mut tx = tx::begin(&self.pool, ENTITY).await?;
        let result = insert(&mut *tx, subject).await;
        let id = tx::finish(tx, ENTITY, result).await?;

        tracing::info!(user_id = %id, "user created");
        Ok(id)
    }
}

async fn insert(conn: &mut PgConnection, subject: &NewSubject) -> Result<Uuid, StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO users (user_id, name, email, password, role, created_at, updated_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        RETURNING user_id
        ",
    )
    .bind(&subject.name)
    .bind(&subject.email)
    .bind(&subject.password_hash)
    .bind(subject.role.as_str())
    .fetch_one(conn)
    .await
    .map_err(|e| StoreError::from_db(ENTITY, e))
}
