use sqlx::PgPool;

use super::identities::{IdentityStore, NewSubject, PgIdentityStore};
use crate::auth::password;
use crate::auth::role::Role;

/// Seed the first administrator when the user table is empty.
///
/// Does nothing unless both an email and a password are supplied, so a
/// deployment without them simply starts with no admin.
#[tracing::instrument(skip(pool, admin_password), err)]
pub async fn run(
    pool: &PgPool,
    admin_email: Option<&str>,
    admin_password: Option<&str>,
) -> anyhow::Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        tracing::debug!(count, "users present, skipping bootstrap");
        return Ok(());
    }

    let (Some(email), Some(plain)) = (admin_email, admin_password) else {
        tracing::warn!("no users and no admin credentials configured; skipping admin seed");
        return Ok(());
    };

    let admin_id = PgIdentityStore::new(pool.clone())
        .create(&NewSubject {
            name: "admin".into(),
            email: email.trim().to_lowercase(),
            password_hash: password::hash_password(plain)?,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = %admin_id, "admin user created");
    Ok(())
}
