//! Transaction-aware data source.
//!
//! A [`TransactionalDataSource`] begins one sqlx transaction and hands that
//! transaction's connection to every `acquire()` until it is committed or
//! rolled back. A [`SqlTemplate`](crate::db::SqlTemplate) built on it runs
//! each statement inside the same transaction without knowing about it.
//!
//! Acquiring locks the transaction; the lock is released when the statement
//! invocation drops its connection. Concurrent callers therefore run one
//! statement at a time, in lock order.

use crate::db::driver::DataSource;
use crate::db::statement::{SqlxConnection, completed_transaction};
use crate::error::{DataAccessError, DataAccessResult, DriverError, FailureStage};
use sqlx::{Database, MySql, Pool, Postgres, Sqlite, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Data source bound to a single open transaction.
pub struct TransactionalDataSource<DB: Database> {
    transaction: Arc<Mutex<Option<Transaction<'static, DB>>>>,
}

impl<DB: Database> Clone for TransactionalDataSource<DB> {
    fn clone(&self) -> Self {
        Self {
            transaction: Arc::clone(&self.transaction),
        }
    }
}

impl<DB: Database> std::fmt::Debug for TransactionalDataSource<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalDataSource").finish_non_exhaustive()
    }
}

impl<DB: Database> TransactionalDataSource<DB> {
    /// Begin a transaction on a connection taken from `pool`.
    pub async fn begin(pool: &Pool<DB>) -> DataAccessResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| DataAccessError::new(FailureStage::Acquire, "BEGIN", e))?;

        info!(db = DB::NAME, "Transaction started");

        Ok(Self {
            transaction: Arc::new(Mutex::new(Some(tx))),
        })
    }

    /// Whether the transaction is still open.
    pub async fn is_active(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    /// Commit the transaction. Later acquisitions fail.
    pub async fn commit(&self) -> DataAccessResult<()> {
        let tx = self.take("COMMIT").await?;
        tx.commit()
            .await
            .map_err(|e| DataAccessError::new(FailureStage::Execute, "COMMIT", e))?;
        info!(db = DB::NAME, "Transaction committed");
        Ok(())
    }

    /// Roll the transaction back. Later acquisitions fail.
    pub async fn rollback(&self) -> DataAccessResult<()> {
        let tx = self.take("ROLLBACK").await?;
        tx.rollback()
            .await
            .map_err(|e| DataAccessError::new(FailureStage::Execute, "ROLLBACK", e))?;
        info!(db = DB::NAME, "Transaction rolled back");
        Ok(())
    }

    async fn take(&self, sql: &str) -> DataAccessResult<Transaction<'static, DB>> {
        self.transaction
            .lock()
            .await
            .take()
            .ok_or_else(|| DataAccessError::new(FailureStage::Acquire, sql, completed_transaction()))
    }

    async fn lock_connection(&self) -> Result<SqlxConnection<DB>, DriverError> {
        let guard = Arc::clone(&self.transaction).lock_owned().await;
        if guard.is_none() {
            return Err(completed_transaction());
        }
        debug!(db = DB::NAME, "Reusing transaction connection");
        Ok(SqlxConnection::Transaction(guard))
    }
}

macro_rules! impl_transactional_source {
    ($db:ty) => {
        impl DataSource for TransactionalDataSource<$db> {
            type Connection = SqlxConnection<$db>;

            async fn acquire(&self) -> Result<SqlxConnection<$db>, DriverError> {
                self.lock_connection().await
            }
        }
    };
}

impl_transactional_source!(Sqlite);
impl_transactional_source!(Postgres);
impl_transactional_source!(MySql);
