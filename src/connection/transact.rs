use futures::future::BoxFuture;
use tracing::warn;

use super::Connection;
use crate::error::Result;

/// Run `f` inside a transaction when the connection supports one.
///
/// The transaction commits when `f` succeeds and rolls back when it fails.
/// Without transaction support `f` runs directly on `conn`.
///
/// The future borrows only the connection, so anything else it needs is moved
/// into the closure and handed back through `R`.
///
/// ```ignore
/// let models = Arc::new(models);
/// let (a, b) = transact(&mut conn, move |tx| {
///     Box::pin(async move {
///         let (mut a, mut b) = (a, b);
///         models.insert(tx, &mut a).await?;
///         models.insert(tx, &mut b).await?;
///         Ok((a, b))
///     })
/// })
/// .await?;
/// ```
pub async fn transact<F, R>(conn: &mut dyn Connection, f: F) -> Result<R>
where
    F: for<'c> FnOnce(&'c mut dyn Connection) -> BoxFuture<'c, Result<R>> + Send,
    R: Send,
{
    if !conn.capabilities().transactions {
        return f(conn).await;
    }

    let mut tx = conn.begin().await?;
    match f(tx.as_connection()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, cause = %e, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

/// Run `f` inside a transaction that is always rolled back.
///
/// Useful in tests that must leave the database unchanged. Fails when the
/// connection cannot begin a transaction.
pub async fn transact_rollback<F, R>(conn: &mut dyn Connection, f: F) -> Result<R>
where
    F: for<'c> FnOnce(&'c mut dyn Connection) -> BoxFuture<'c, Result<R>> + Send,
    R: Send,
{
    let mut tx = conn.begin().await?;
    let result = f(tx.as_connection()).await;
    match tx.rollback().await {
        Ok(()) => result,
        Err(rollback) if result.is_ok() => Err(rollback.into()),
        Err(rollback) => {
            warn!(error = %rollback, "Failed to roll back transaction");
            result
        }
    }
}
