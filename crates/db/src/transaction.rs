//! Transaction scope for multi-statement writes.

use std::{future::Future, pin::Pin};

use pollbox_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, error};

/// Boxed future borrowing the transaction it runs in.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>;

/// Run `work` inside a single database transaction.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err`. A
/// failed rollback is logged at error level and the original error is
/// still returned. If the returned future is dropped before completion
/// (request timeout, client disconnect) or `work` panics, the transaction
/// is dropped uncommitted and sea-orm rolls it back.
pub async fn run_in_transaction<T, F>(
    db: &DatabaseConnection,
    operation: &'static str,
    work: F,
) -> AppResult<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
{
    let txn = db.begin().await.map_err(|e| {
        error!(operation, error = %e, "Failed to begin transaction");
        AppError::Database(e.to_string())
    })?;

    let result = work(&txn).await;

    match result {
        Ok(value) => {
            txn.commit().await.map_err(|e| {
                error!(operation, error = %e, "Failed to commit transaction");
                AppError::Database(e.to_string())
            })?;
            Ok(value)
        }
        Err(cause) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(
                    operation,
                    error = %rollback_err,
                    cause = %cause,
                    "Transaction rollback failed; storage may need operator attention"
                );
            } else {
                debug!(operation, cause = %cause, "Transaction rolled back");
            }
            Err(cause)
        }
    }
}
