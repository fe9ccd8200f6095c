//! SQL Template Library
//!
//! Runs parameterized SQL against a connection provider with a fixed
//! acquire, prepare, bind, execute, release sequence, and maps query rows
//! through caller-supplied functions. Backed by sqlx for SQLite, PostgreSQL
//! and MySQL.

pub mod config;
pub mod db;
pub mod error;

pub use config::{Config, DatabaseConfig};
pub use db::{
    DbPool, PooledDataSource, RowToJson, SqlTemplate, SqlValue, TransactionalDataSource,
};
pub use error::{ConfigError, DataAccessError, DataAccessResult, DriverError, FailureStage};
