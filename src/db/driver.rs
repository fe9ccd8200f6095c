//! Driver-facing contracts consumed by the template.
//!
//! The template only talks to a database through these traits:
//!
//! - [`DataSource`] hands out one [`Connection`] per invocation
//! - [`Connection::prepare`] turns the connection into a [`PreparedStatement`]
//!   that owns it for the rest of the invocation
//! - [`PreparedStatement`] binds positional values and executes either as a
//!   mutation or as a query producing a [`RowCursor`]
//!
//! Releasing is ownership-based: dropping a connection or the statement
//! holding it returns the connection to its provider. This keeps release
//! unconditional on every exit path, including early returns and cancelled
//! futures.

use crate::db::value::SqlValue;
use crate::error::DriverError;
use std::future::Future;

/// Provider of connections, typically a pool.
pub trait DataSource: Send + Sync {
    type Connection: Connection;

    /// Obtain a connection for exclusive use by one invocation.
    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send;
}

/// A connection exclusively owned by the current invocation.
///
/// Dropping it releases it.
pub trait Connection: Send + 'static {
    type Statement: PreparedStatement;

    /// Prepare `sql`, moving the connection into the returned statement.
    ///
    /// On failure the connection is dropped, and thereby released.
    fn prepare(self, sql: &str) -> impl Future<Output = Result<Self::Statement, DriverError>> + Send;
}

/// A prepared statement bound to its connection.
pub trait PreparedStatement: Send + 'static {
    type Row: Send;
    type Cursor<'s>: RowCursor<Row = Self::Row>
    where
        Self: 's;

    /// Bind `value` to the 1-based placeholder `index`.
    fn bind_at(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError>;

    /// Run as a mutation and return the number of affected rows.
    fn execute_update(&mut self) -> impl Future<Output = Result<u64, DriverError>> + Send;

    /// Run as a query and return a forward-only cursor over its rows.
    fn execute_query(
        &mut self,
    ) -> impl Future<Output = Result<Self::Cursor<'_>, DriverError>> + Send;
}

/// Forward-only, single-pass cursor over query rows.
pub trait RowCursor: Send {
    type Row: Send;

    /// Advance to the next row, `None` once exhausted.
    fn next_row(&mut self) -> impl Future<Output = Result<Option<Self::Row>, DriverError>> + Send;
}

/// Statement type produced by a data source.
pub type StatementOf<S> = <<S as DataSource>::Connection as Connection>::Statement;

/// Row type produced by a data source.
pub type RowOf<S> = <StatementOf<S> as PreparedStatement>::Row;
