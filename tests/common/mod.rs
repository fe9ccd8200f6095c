//! Scripted in-memory driver shared by the integration tests.
//!
//! Rows are `Vec<SqlValue>`. Failures can be injected at any lifecycle step,
//! and every connection handed out is tracked until dropped.

#![allow(dead_code)]

use sql_template::SqlValue;
use sql_template::db::{Connection, DataSource, PreparedStatement, RowCursor};
use sql_template::error::DriverError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type MockRow = Vec<SqlValue>;

/// Step at which the mock should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Acquire,
    Prepare,
    Bind(usize),
    Execute,
    /// Fail while reading the row at this 0-based position.
    Row(usize),
}

#[derive(Debug, Default)]
struct Shared {
    outstanding: AtomicUsize,
    acquired: AtomicUsize,
    executions: AtomicUsize,
    rows_read: AtomicUsize,
    last_binds: Mutex<Vec<(usize, SqlValue)>>,
    last_sql: Mutex<String>,
}

/// Data source returning a fixed result for every statement.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    shared: Arc<Shared>,
    rows: Vec<MockRow>,
    affected: u64,
    fail_at: Option<FailAt>,
}

impl MockSource {
    pub fn with_rows(rows: Vec<MockRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn with_affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }

    /// Connections handed out and not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.shared.executions.load(Ordering::SeqCst)
    }

    /// Rows pulled from cursors across all invocations.
    pub fn rows_read(&self) -> usize {
        self.shared.rows_read.load(Ordering::SeqCst)
    }

    /// Binds recorded by the most recent statement, in call order.
    pub fn last_binds(&self) -> Vec<(usize, SqlValue)> {
        self.shared.last_binds.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> String {
        self.shared.last_sql.lock().unwrap().clone()
    }
}

pub struct MockConnection {
    source: MockSource,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.source.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockStatement {
    connection: MockConnection,
}

pub struct MockCursor<'s> {
    statement: &'s MockStatement,
    position: usize,
}

impl DataSource for MockSource {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<MockConnection, DriverError> {
        if self.fail_at == Some(FailAt::Acquire) {
            return Err("connection refused".into());
        }
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            source: self.clone(),
        })
    }
}

impl Connection for MockConnection {
    type Statement = MockStatement;

    async fn prepare(self, sql: &str) -> Result<MockStatement, DriverError> {
        if self.source.fail_at == Some(FailAt::Prepare) {
            return Err(format!("syntax error near \"{}\"", sql).into());
        }
        *self.source.shared.last_sql.lock().unwrap() = sql.to_string();
        self.source.shared.last_binds.lock().unwrap().clear();
        Ok(MockStatement { connection: self })
    }
}

impl MockStatement {
    fn source(&self) -> &MockSource {
        &self.connection.source
    }

    fn begin_execution(&self) -> Result<(), DriverError> {
        if self.source().fail_at == Some(FailAt::Execute) {
            return Err("deadlock detected".into());
        }
        self.source().shared.executions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PreparedStatement for MockStatement {
    type Row = MockRow;
    type Cursor<'s> = MockCursor<'s>;

    fn bind_at(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
        if self.source().fail_at == Some(FailAt::Bind(index)) {
            return Err(format!("cannot bind parameter {}", index).into());
        }
        self.source()
            .shared
            .last_binds
            .lock()
            .unwrap()
            .push((index, value));
        Ok(())
    }

    async fn execute_update(&mut self) -> Result<u64, DriverError> {
        self.begin_execution()?;
        Ok(self.source().affected)
    }

    async fn execute_query(&mut self) -> Result<MockCursor<'_>, DriverError> {
        self.begin_execution()?;
        Ok(MockCursor {
            statement: self,
            position: 0,
        })
    }
}

impl RowCursor for MockCursor<'_> {
    type Row = MockRow;

    async fn next_row(&mut self) -> Result<Option<MockRow>, DriverError> {
        let source = self.statement.source();
        if source.fail_at == Some(FailAt::Row(self.position)) {
            return Err("connection reset while reading rows".into());
        }
        let row = source.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
            source.shared.rows_read.fetch_add(1, Ordering::SeqCst);
        }
        Ok(row)
    }
}

/// Map the first column of a row to an integer.
pub fn first_int(row: &MockRow) -> Result<i64, DriverError> {
    match row.first() {
        Some(SqlValue::Int(v)) => Ok(*v),
        other => Err(format!("expected integer column, got {:?}", other).into()),
    }
}
