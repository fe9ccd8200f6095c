//! sqlx-backed implementation of the driver contracts.
//!
//! [`PooledDataSource`] hands out pooled connections; the
//! [`TransactionalDataSource`](crate::db::transaction::TransactionalDataSource)
//! hands out its transaction's connection instead. Both produce a
//! [`SqlxConnection`], so statements and cursors are shared.
//!
//! The trait impls are generated per backend by `impl_sqlx_driver!`, which
//! keeps every impl on concrete sqlx types (`Sqlite`, `Postgres`, `MySql`).

use crate::db::driver::{Connection, DataSource, PreparedStatement, RowCursor};
use crate::db::value::SqlValue;
use crate::error::DriverError;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use serde_json::Value as JsonValue;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Database, Either, MySql, Pool, Postgres, Sqlite, Transaction};
use tokio::sync::OwnedMutexGuard;

/// Data source that acquires a fresh connection from a sqlx pool per call.
#[derive(Debug)]
pub struct PooledDataSource<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> PooledDataSource<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

impl<DB: Database> Clone for PooledDataSource<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// A connection held for one statement invocation.
///
/// Dropping a pooled connection returns it to the pool; dropping a
/// transaction-bound one unlocks the transaction for the next caller.
pub enum SqlxConnection<DB: Database> {
    Pooled(PoolConnection<DB>),
    Transaction(OwnedMutexGuard<Option<Transaction<'static, DB>>>),
}

impl<DB: Database> SqlxConnection<DB> {
    fn raw(&mut self) -> Result<&mut DB::Connection, DriverError> {
        match self {
            SqlxConnection::Pooled(conn) => Ok(&mut **conn),
            SqlxConnection::Transaction(guard) => match (**guard).as_mut() {
                Some(tx) => Ok(&mut **tx),
                None => Err(completed_transaction()),
            },
        }
    }
}

impl<DB: Database> std::fmt::Debug for SqlxConnection<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlxConnection::Pooled(_) => f.write_str("SqlxConnection::Pooled"),
            SqlxConnection::Transaction(_) => f.write_str("SqlxConnection::Transaction"),
        }
    }
}

pub(crate) fn completed_transaction() -> DriverError {
    "transaction already committed or rolled back".into()
}

/// A prepared statement that owns its connection until dropped.
pub struct SqlxStatement<DB: Database> {
    connection: SqlxConnection<DB>,
    sql: String,
    /// Placeholder count reported by the server, when it reports one.
    placeholders: Option<usize>,
    /// Slot `i` holds the value for placeholder `i + 1`.
    values: Vec<Option<SqlValue>>,
}

impl<DB: Database> SqlxStatement<DB> {
    fn new(connection: SqlxConnection<DB>, sql: &str, placeholders: Option<usize>) -> Self {
        Self {
            connection,
            sql: sql.to_string(),
            placeholders,
            values: Vec::new(),
        }
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of placeholders in the prepared SQL, if known.
    pub fn placeholders(&self) -> Option<usize> {
        self.placeholders
    }

    fn set_value(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
        check_index(index, self.placeholders)?;
        if self.values.len() < index {
            self.values.resize(index, None);
        }
        self.values[index - 1] = Some(value);
        Ok(())
    }
}

fn check_index(index: usize, placeholders: Option<usize>) -> Result<(), DriverError> {
    if index == 0 {
        return Err("parameter index 0 is out of range; placeholders start at 1".into());
    }
    match placeholders {
        Some(count) if index > count => Err(format!(
            "parameter index {} is out of range; statement has {} placeholder(s)",
            index, count
        )
        .into()),
        _ => Ok(()),
    }
}

/// Values in placeholder order, failing on any gap or missing trailing value.
fn bound_values(
    values: &[Option<SqlValue>],
    placeholders: Option<usize>,
) -> Result<Vec<&SqlValue>, DriverError> {
    if let Some(count) = placeholders {
        if values.len() < count {
            return Err(format!(
                "statement expects {} parameter(s) but {} were bound",
                count,
                values.len()
            )
            .into());
        }
    }
    values
        .iter()
        .enumerate()
        .map(|(slot, value)| {
            value
                .as_ref()
                .ok_or_else(|| DriverError::from(format!("no value bound for parameter {}", slot + 1)))
        })
        .collect()
}

/// Placeholder count from a prepared statement's parameter description.
fn placeholder_count<T>(parameters: Option<Either<&[T], usize>>) -> Option<usize> {
    parameters.map(|params| match params {
        Either::Left(types) => types.len(),
        Either::Right(count) => count,
    })
}

impl<DB: Database> std::fmt::Debug for SqlxStatement<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bound values may be sensitive; only report how many there are.
        f.debug_struct("SqlxStatement")
            .field("connection", &self.connection)
            .field("sql", &self.sql)
            .field("placeholders", &self.placeholders)
            .field("bound", &self.values.len())
            .finish()
    }
}

/// Forward-only cursor over a query's rows, borrowing its statement.
pub struct SqlxCursor<'s, DB: Database> {
    rows: BoxStream<'s, Result<DB::Row, sqlx::Error>>,
}

impl<'s, DB: Database> SqlxCursor<'s, DB> {
    fn new(rows: BoxStream<'s, Result<DB::Row, sqlx::Error>>) -> Self {
        Self { rows }
    }
}

macro_rules! impl_sqlx_driver {
    ($db:ty) => {
        impl SqlxStatement<$db> {
            /// Build the sqlx query with every value bound in placeholder order.
            fn query<'q>(
                sql: &'q str,
                values: &'q [Option<SqlValue>],
                placeholders: Option<usize>,
            ) -> Result<Query<'q, $db, <$db as Database>::Arguments<'q>>, DriverError> {
                let mut query = sqlx::query(sql);
                for value in bound_values(values, placeholders)? {
                    query = match value {
                        SqlValue::Null => query.bind(None::<String>),
                        SqlValue::Bool(v) => query.bind(*v),
                        SqlValue::Int(v) => query.bind(*v),
                        SqlValue::Float(v) => query.bind(*v),
                        SqlValue::Text(v) => query.bind(v.as_str()),
                        SqlValue::Bytes(v) => query.bind(v.as_slice()),
                        SqlValue::Json(v) => query.bind(Json::<&JsonValue>(v)),
                    };
                }
                Ok(query)
            }
        }

        impl DataSource for PooledDataSource<$db> {
            type Connection = SqlxConnection<$db>;

            async fn acquire(&self) -> Result<SqlxConnection<$db>, DriverError> {
                let conn = self.pool.acquire().await?;
                Ok(SqlxConnection::Pooled(conn))
            }
        }

        impl Connection for SqlxConnection<$db> {
            type Statement = SqlxStatement<$db>;

            async fn prepare(mut self, sql: &str) -> Result<SqlxStatement<$db>, DriverError> {
                let placeholders = {
                    use sqlx::{Executor as _, Statement as _};
                    let prepared = self.raw()?.prepare(sql).await?;
                    placeholder_count(prepared.parameters())
                };
                Ok(SqlxStatement::new(self, sql, placeholders))
            }
        }

        impl PreparedStatement for SqlxStatement<$db> {
            type Row = <$db as Database>::Row;
            type Cursor<'s> = SqlxCursor<'s, $db>;

            fn bind_at(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
                self.set_value(index, value)
            }

            async fn execute_update(&mut self) -> Result<u64, DriverError> {
                let query = Self::query(&self.sql, &self.values, self.placeholders)?;
                let result = query.execute(self.connection.raw()?).await?;
                Ok(result.rows_affected())
            }

            async fn execute_query(&mut self) -> Result<SqlxCursor<'_, $db>, DriverError> {
                let query = Self::query(&self.sql, &self.values, self.placeholders)?;
                Ok(SqlxCursor::new(query.fetch(self.connection.raw()?)))
            }
        }

        impl RowCursor for SqlxCursor<'_, $db> {
            type Row = <$db as Database>::Row;

            async fn next_row(&mut self) -> Result<Option<Self::Row>, DriverError> {
                Ok(self.rows.try_next().await?)
            }
        }
    };
}

impl_sqlx_driver!(Sqlite);
impl_sqlx_driver!(Postgres);
impl_sqlx_driver!(MySql);
