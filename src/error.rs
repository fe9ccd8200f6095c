//! Error types for the SQL template.
//!
//! Every public template operation fails with exactly one type,
//! [`DataAccessError`]. It records which step of the statement lifecycle
//! failed and keeps the driver-reported cause reachable through
//! [`std::error::Error::source`], so callers handle one category while still
//! being able to inspect the original failure.
//!
//! Building pools and parsing configuration happens outside the template and
//! reports [`ConfigError`] instead.

use std::fmt;
use thiserror::Error;

/// Type-erased failure reported by a driver, pool or row mapper.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The step of a statement invocation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// Obtaining a connection from the data source.
    Acquire,
    /// Preparing the SQL text on the connection.
    Prepare,
    /// Binding a positional value.
    Bind,
    /// Running the statement or reading the cursor.
    Execute,
    /// Converting a result row into a caller value.
    MapRow,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquire => "connection acquisition",
            Self::Prepare => "statement preparation",
            Self::Bind => "parameter binding",
            Self::Execute => "statement execution",
            Self::MapRow => "row mapping",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single failure category surfaced by the template.
#[derive(Error, Debug)]
#[error("Data access failed during {stage}: {source} (sql: {sql})")]
pub struct DataAccessError {
    stage: FailureStage,
    sql: String,
    #[source]
    source: DriverError,
}

impl DataAccessError {
    /// Wrap a driver failure that happened while running `sql`.
    pub fn new(stage: FailureStage, sql: impl Into<String>, source: impl Into<DriverError>) -> Self {
        Self {
            stage,
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// The lifecycle step that failed.
    pub fn stage(&self) -> FailureStage {
        self.stage
    }

    /// The SQL template (never the bound values).
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Consume the error and return the underlying cause.
    pub fn into_cause(self) -> DriverError {
        self.source
    }

    fn sqlx_cause(&self) -> Option<&sqlx::Error> {
        self.source.downcast_ref::<sqlx::Error>()
    }

    /// Vendor SQLSTATE code, when the cause is a database-reported error.
    /// e.g. "42P01" for an undefined table on PostgreSQL.
    pub fn sql_state(&self) -> Option<String> {
        match self.sqlx_cause() {
            Some(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.to_string()),
            _ => None,
        }
    }

    /// An actionable hint for the failed stage.
    pub fn suggestion(&self) -> &'static str {
        match self.stage {
            FailureStage::Acquire => {
                "Check that the database is reachable and the pool is not exhausted or closed"
            }
            FailureStage::Prepare => "Check the SQL syntax and referenced objects",
            FailureStage::Bind => {
                "Check that every placeholder has exactly one bind value, starting at index 1"
            }
            FailureStage::Execute => {
                "Check constraints, placeholder count and the values bound to the statement"
            }
            FailureStage::MapRow => "Check that the row mapper reads existing columns with matching types",
        }
    }

    /// Whether repeating the call may succeed without changing it.
    ///
    /// The template never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self.sqlx_cause() {
            Some(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Some(_) => false,
            None => self.stage == FailureStage::Acquire,
        }
    }
}

/// Result type alias for template operations.
pub type DataAccessResult<T> = Result<T, DataAccessError>;

/// A failure inside one statement invocation, before it is tied to its SQL.
///
/// Strategies return this; the template turns it into a [`DataAccessError`].
/// Driver errors convert with `?` and count as execution failures.
#[derive(Debug)]
pub struct StatementError {
    stage: FailureStage,
    source: DriverError,
}

impl StatementError {
    pub fn new(stage: FailureStage, source: impl Into<DriverError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn acquire(source: DriverError) -> Self {
        Self::new(FailureStage::Acquire, source)
    }

    pub fn prepare(source: DriverError) -> Self {
        Self::new(FailureStage::Prepare, source)
    }

    pub fn bind(source: DriverError) -> Self {
        Self::new(FailureStage::Bind, source)
    }

    pub fn execute(source: DriverError) -> Self {
        Self::new(FailureStage::Execute, source)
    }

    pub fn map_row(source: DriverError) -> Self {
        Self::new(FailureStage::MapRow, source)
    }

    pub fn stage(&self) -> FailureStage {
        self.stage
    }

    /// Attach the SQL template that was being run.
    pub fn with_sql(self, sql: impl Into<String>) -> DataAccessError {
        DataAccessError::new(self.stage, sql, self.source)
    }
}

impl From<DriverError> for StatementError {
    fn from(source: DriverError) -> Self {
        Self::execute(source)
    }
}

/// Errors raised while building configuration or data sources.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid connection URL: {message}")]
    InvalidUrl { message: String },

    #[error("Unknown database type for connection '{id}'")]
    UnknownDatabaseType { id: String },

    #[error("Invalid pool options: {message}")]
    InvalidPoolOptions { message: String },

    #[error("Failed to connect to {database}: {source}")]
    Connect {
        database: String,
        suggestion: String,
        #[source]
        source: sqlx::Error,
    },
}

impl ConfigError {
    /// Create an invalid URL error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Create an invalid pool options error.
    pub fn invalid_pool_options(message: impl Into<String>) -> Self {
        Self::InvalidPoolOptions {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connect { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}
