//! Database access layer.
//!
//! - Driver contracts the template executes against
//! - The statement template and its execution strategies
//! - sqlx-backed data sources (pooled and transaction-bound)
//! - Parameter values and binding
//! - Connection pool construction and dispatch macros

#[macro_use]
pub mod macros;
pub mod driver;
pub mod executor;
pub mod pool;
pub mod statement;
pub mod strategy;
pub mod transaction;
pub mod types;
pub mod value;

pub use driver::{Connection, DataSource, PreparedStatement, RowCursor, RowOf, StatementOf};
pub use executor::SqlTemplate;
pub use pool::DbPool;
pub use statement::{PooledDataSource, SqlxConnection, SqlxCursor, SqlxStatement};
pub use strategy::{ExecuteUpdate, QueryAll, QueryFirst, StatementStrategy};
pub use transaction::TransactionalDataSource;
pub use types::RowToJson;
pub use value::SqlValue;
