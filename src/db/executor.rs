//! Statement execution template.
//!
//! [`SqlTemplate`] runs exactly one prepared statement per call:
//!
//! 1. acquire a connection from the data source
//! 2. prepare the SQL text on it
//! 3. bind each value to its 1-based placeholder, in order
//! 4. hand the statement to a [`StatementStrategy`] once
//! 5. release the statement and connection
//!
//! Release is tied to ownership, so it happens on every exit path. Any failure
//! along the way is logged once and returned as a [`DataAccessError`].

use crate::db::driver::{Connection, DataSource, PreparedStatement, RowOf, StatementOf};
use crate::db::strategy::{ExecuteUpdate, QueryAll, QueryFirst, StatementStrategy};
use crate::db::value::SqlValue;
use crate::error::{DataAccessResult, DriverError, StatementError};
use tracing::{debug, error};

/// Parameterized SQL execution against a data source.
///
/// Holds nothing but the data source handle, so a single template can be
/// shared by concurrent callers; each call works on its own connection.
#[derive(Debug, Clone)]
pub struct SqlTemplate<S> {
    data_source: S,
}

impl<S: DataSource> SqlTemplate<S> {
    pub fn new(data_source: S) -> Self {
        Self { data_source }
    }

    /// Get a reference to the underlying data source.
    pub fn data_source(&self) -> &S {
        &self.data_source
    }

    /// Execute `sql` with `values` bound in order, running `strategy` on the
    /// prepared statement.
    ///
    /// The strategy's output is returned unchanged. Only the SQL template is
    /// logged; bound values never are.
    pub async fn execute_statement<A>(
        &self,
        sql: &str,
        values: &[SqlValue],
        strategy: A,
    ) -> DataAccessResult<A::Output>
    where
        A: StatementStrategy<StatementOf<S>>,
    {
        debug!(sql = %sql, params = values.len(), "Executing statement");

        self.run(sql, values, strategy).await.map_err(|failure| {
            let err = failure.with_sql(sql);
            error!(
                sql = %sql,
                stage = %err.stage(),
                error = %err.cause(),
                "Statement failed"
            );
            err
        })
    }

    async fn run<A>(
        &self,
        sql: &str,
        values: &[SqlValue],
        strategy: A,
    ) -> Result<A::Output, StatementError>
    where
        A: StatementStrategy<StatementOf<S>>,
    {
        let connection = self
            .data_source
            .acquire()
            .await
            .map_err(StatementError::acquire)?;

        // The statement owns the connection from here on; both are dropped
        // when this scope ends, whichever way it ends.
        let mut statement = connection
            .prepare(sql)
            .await
            .map_err(StatementError::prepare)?;

        for (position, value) in values.iter().enumerate() {
            statement
                .bind_at(position + 1, value.clone())
                .map_err(StatementError::bind)?;
        }

        strategy.run(&mut statement).await
    }

    /// Execute a mutation (INSERT, UPDATE, DELETE, DDL) and return the
    /// affected-row count reported by the driver.
    pub async fn update(&self, sql: &str, values: &[SqlValue]) -> DataAccessResult<u64> {
        self.execute_statement(sql, values, ExecuteUpdate).await
    }

    /// Execute a query and map its first row.
    ///
    /// Returns `None` when nothing matches. Additional rows are ignored, not
    /// treated as an error.
    pub async fn query_for_object<T, M>(
        &self,
        sql: &str,
        mapper: M,
        values: &[SqlValue],
    ) -> DataAccessResult<Option<T>>
    where
        M: Fn(&RowOf<S>) -> Result<T, DriverError> + Send,
        T: Send,
    {
        self.execute_statement(sql, values, QueryFirst::new(mapper))
            .await
    }

    /// Execute a query and map every row, preserving cursor order.
    ///
    /// An empty result is an empty `Vec`.
    pub async fn query_for_objects<T, M>(
        &self,
        sql: &str,
        mapper: M,
        values: &[SqlValue],
    ) -> DataAccessResult<Vec<T>>
    where
        M: Fn(&RowOf<S>) -> Result<T, DriverError> + Send,
        T: Send,
    {
        self.execute_statement(sql, values, QueryAll::new(mapper))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::RowCursor;
    use crate::error::FailureStage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Data source whose connections record their release.
    #[derive(Clone, Default)]
    struct CountingSource {
        outstanding: Arc<AtomicUsize>,
        rows: Vec<i64>,
    }

    struct CountingConnection {
        outstanding: Arc<AtomicUsize>,
        rows: Vec<i64>,
    }

    impl Drop for CountingConnection {
        fn drop(&mut self) {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct CountingStatement {
        _connection: CountingConnection,
        rows: Vec<i64>,
        bound: Vec<(usize, SqlValue)>,
    }

    struct VecCursor<'s> {
        rows: std::slice::Iter<'s, i64>,
    }

    impl DataSource for CountingSource {
        type Connection = CountingConnection;

        async fn acquire(&self) -> Result<CountingConnection, DriverError> {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            Ok(CountingConnection {
                outstanding: Arc::clone(&self.outstanding),
                rows: self.rows.clone(),
            })
        }
    }

    impl Connection for CountingConnection {
        type Statement = CountingStatement;

        async fn prepare(self, sql: &str) -> Result<CountingStatement, DriverError> {
            if sql.is_empty() {
                return Err("empty statement".into());
            }
            let rows = self.rows.clone();
            Ok(CountingStatement {
                _connection: self,
                rows,
                bound: Vec::new(),
            })
        }
    }

    impl PreparedStatement for CountingStatement {
        type Row = i64;
        type Cursor<'s> = VecCursor<'s>;

        fn bind_at(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
            self.bound.push((index, value));
            Ok(())
        }

        async fn execute_update(&mut self) -> Result<u64, DriverError> {
            Ok(self.bound.len() as u64)
        }

        async fn execute_query(&mut self) -> Result<VecCursor<'_>, DriverError> {
            Ok(VecCursor {
                rows: self.rows.iter(),
            })
        }
    }

    impl RowCursor for VecCursor<'_> {
        type Row = i64;

        async fn next_row(&mut self) -> Result<Option<i64>, DriverError> {
            Ok(self.rows.next().copied())
        }
    }

    fn template(rows: Vec<i64>) -> SqlTemplate<CountingSource> {
        SqlTemplate::new(CountingSource {
            outstanding: Arc::default(),
            rows,
        })
    }

    fn outstanding(template: &SqlTemplate<CountingSource>) -> usize {
        template.data_source().outstanding.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_update_binds_in_order() {
        let template = template(vec![]);
        let affected = template
            .update("UPDATE t SET a = ? WHERE b = ?", &crate::params![1, "x"])
            .await
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(outstanding(&template), 0);
    }

    #[tokio::test]
    async fn test_query_for_object_maps_first_row_only() {
        let template = template(vec![10, 20, 30]);
        let calls = AtomicUsize::new(0);
        let first = template
            .query_for_object(
                "SELECT a FROM t",
                |row: &i64| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(*row * 2)
                },
                &[],
            )
            .await
            .unwrap();
        assert_eq!(first, Some(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_for_objects_empty_is_empty_vec() {
        let template = template(vec![]);
        let rows = template
            .query_for_objects("SELECT a FROM t", |row: &i64| Ok(*row), &[])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_failure_releases_connection() {
        let template = template(vec![1]);
        let err = template.update("", &[]).await.unwrap_err();
        assert_eq!(err.stage(), FailureStage::Prepare);
        assert_eq!(outstanding(&template), 0);
    }

    #[tokio::test]
    async fn test_mapper_failure_is_row_mapping_stage() {
        let template = template(vec![1, 2]);
        let err = template
            .query_for_objects(
                "SELECT a FROM t",
                |row: &i64| -> Result<i64, DriverError> {
                    if *row == 2 {
                        Err("unexpected value".into())
                    } else {
                        Ok(*row)
                    }
                },
                &[],
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::MapRow);
        assert_eq!(outstanding(&template), 0);
    }
}
