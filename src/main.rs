//! sql-template - Main entry point.
//!
//! Runs one parameterized statement through [`SqlTemplate`] against the
//! configured database and prints the result as JSON.

use clap::Parser;
use serde_json::Value as JsonValue;
use sql_template::config::{Command, Config, DatabaseConfig};
use sql_template::db::{DataSource, PooledDataSource, RowOf, RowToJson, SqlTemplate, pool};
use sql_template::error::DriverError;
use sql_template::impl_db_dispatch;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the result.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run<S>(template: SqlTemplate<S>, command: &Command) -> Result<JsonValue, Box<dyn std::error::Error>>
where
    S: DataSource,
    RowOf<S>: RowToJson,
{
    let args = command.statement();
    let values = args.bind_values();
    let to_json = |row: &RowOf<S>| -> Result<JsonValue, DriverError> { Ok(row.to_json()) };

    let output = match command {
        Command::Update(_) => {
            let affected = template.update(&args.sql, &values).await?;
            serde_json::json!({ "rows_affected": affected })
        }
        Command::QueryOne(_) => template
            .query_for_object(&args.sql, to_json, &values)
            .await?
            .unwrap_or(JsonValue::Null),
        Command::Query(_) => {
            JsonValue::Array(template.query_for_objects(&args.sql, to_json, &values).await?)
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting sql-template v{}", env!("CARGO_PKG_VERSION"));

    let db_config = DatabaseConfig::parse(&config.database)?;
    let pool = match pool::connect(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            return Err(e.into());
        }
    };

    let result = impl_db_dispatch!(&pool, {
        MySql(p) => run(SqlTemplate::new(PooledDataSource::new(p.clone())), &config.command).await,
        Postgres(p) => run(SqlTemplate::new(PooledDataSource::new(p.clone())), &config.command).await,
        SQLite(p) => run(SqlTemplate::new(PooledDataSource::new(p.clone())), &config.command).await,
    });

    pool.close().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    info!("Done");
    Ok(())
}
