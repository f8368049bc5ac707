use sqlx::{PgPool, Postgres, Transaction};

use super::StoreError;

pub type PgTx = Transaction<'static, Postgres>;

pub async fn begin(pool: &PgPool, entity: &'static str) -> Result<PgTx, StoreError> {
    pool.begin().await.map_err(|e| {
        tracing::error!(entity, error = %e, "failed to start transaction");
        StoreError::from_db(entity, e)
    })
}

/// Close a transaction according to the outcome of the work done inside it.
///
/// `Ok` commits; `Err` rolls back and returns the original error. A rollback
/// failure is logged and never replaces the error being returned. A failed
/// commit consumes the transaction, and dropping an open sqlx transaction
/// queues its rollback, so the connection goes back to the pool clean.
pub async fn finish<T>(
    tx: PgTx,
    entity: &'static str,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(entity, error = %e, "failed to commit transaction");
                StoreError::from_db(entity, e)
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(entity, error = %rollback_err, "failed to roll back transaction");
            }
            Err(err)
        }
    }
}
