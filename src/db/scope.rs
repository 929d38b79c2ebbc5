//! Transaction scope
//!
//! One scope wraps one unit of work. `finish` commits an `Ok` result and
//! rolls back on `Err`, returning the original error. The underlying
//! connection goes back to its owner exactly once, when the transaction
//! is consumed (or dropped, which also rolls back).

use sqlx::{pool::PoolConnection, Acquire, Any, AnyConnection, AnyPool, Transaction};

use crate::error::AdapterResult;

/// An open transaction for one adapter operation
pub struct TransactionScope<'c> {
    tx: Transaction<'c, Any>,
    operation: &'static str,
}

impl<'c> TransactionScope<'c> {
    /// Begin on the caller's long-lived session when given, otherwise on a
    /// fresh pooled connection
    pub async fn begin(
        pool: &AnyPool,
        session: Option<&'c mut PoolConnection<Any>>,
        operation: &'static str,
    ) -> AdapterResult<Self> {
        let tx = match session {
            Some(conn) => conn.begin().await?,
            None => pool.begin().await?,
        };
        tracing::trace!(operation, "transaction started");

        Ok(Self { tx, operation })
    }

    /// Connection to issue statements on
    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }

    /// Commit on success, roll back on failure
    pub async fn finish<T>(self, result: AdapterResult<T>) -> AdapterResult<T> {
        match result {
            Ok(value) => {
                self.tx.commit().await?;
                tracing::trace!(operation = self.operation, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                tracing::error!(operation = self.operation, error = %err, "rolling back");
                if let Err(rollback_err) = self.tx.rollback().await {
                    tracing::warn!(
                        operation = self.operation,
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}
