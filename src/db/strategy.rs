//! Execution strategies run against a prepared statement.
//!
//! A strategy receives the bound statement exactly once and decides how to
//! run it. The template owns acquisition, binding and release; strategies
//! never touch connections.

use crate::db::driver::{PreparedStatement, RowCursor};
use crate::error::{DriverError, StatementError};
use std::future::Future;
use std::marker::PhantomData;

/// Run a prepared, fully bound statement and produce a result.
pub trait StatementStrategy<P: PreparedStatement>: Send {
    type Output: Send;

    fn run(
        self,
        statement: &mut P,
    ) -> impl Future<Output = Result<Self::Output, StatementError>> + Send;
}

/// Run as a mutation and return the affected-row count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteUpdate;

impl<P: PreparedStatement> StatementStrategy<P> for ExecuteUpdate {
    type Output = u64;

    async fn run(self, statement: &mut P) -> Result<u64, StatementError> {
        Ok(statement.execute_update().await?)
    }
}

/// Run as a query and map the first row, if any.
///
/// Rows after the first are never read.
pub struct QueryFirst<M, T> {
    mapper: M,
    _output: PhantomData<fn() -> T>,
}

impl<M, T> QueryFirst<M, T> {
    pub fn new(mapper: M) -> Self {
        Self {
            mapper,
            _output: PhantomData,
        }
    }
}

impl<P, M, T> StatementStrategy<P> for QueryFirst<M, T>
where
    P: PreparedStatement,
    M: Fn(&P::Row) -> Result<T, DriverError> + Send,
    T: Send,
{
    type Output = Option<T>;

    async fn run(self, statement: &mut P) -> Result<Option<T>, StatementError> {
        let mut cursor = statement.execute_query().await?;
        match cursor.next_row().await? {
            Some(row) => (self.mapper)(&row)
                .map(Some)
                .map_err(StatementError::map_row),
            None => Ok(None),
        }
    }
}

/// Run as a query and map every row in cursor order.
pub struct QueryAll<M, T> {
    mapper: M,
    _output: PhantomData<fn() -> T>,
}

impl<M, T> QueryAll<M, T> {
    pub fn new(mapper: M) -> Self {
        Self {
            mapper,
            _output: PhantomData,
        }
    }
}

impl<P, M, T> StatementStrategy<P> for QueryAll<M, T>
where
    P: PreparedStatement,
    M: Fn(&P::Row) -> Result<T, DriverError> + Send,
    T: Send,
{
    type Output = Vec<T>;

    async fn run(self, statement: &mut P) -> Result<Vec<T>, StatementError> {
        let mut cursor = statement.execute_query().await?;
        let mut mapped = Vec::new();
        while let Some(row) = cursor.next_row().await? {
            mapped.push((self.mapper)(&row).map_err(StatementError::map_row)?);
        }
        Ok(mapped)
    }
}
