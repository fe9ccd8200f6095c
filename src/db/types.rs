//! Row-to-JSON mapping for ad hoc queries.
//!
//! Used as a generic row mapper where the caller has no domain type, such as
//! the command-line tool. Each column is decoded by trying common Rust types
//! in turn (integers, floats, booleans, text, bytes); a column matching none
//! of them, or holding NULL, becomes `null`. Bytes are base64 encoded.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};

pub trait RowToJson {
    /// Column name to value, in column order.
    fn to_json_map(&self) -> Map<String, JsonValue>;

    fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_json_map())
    }
}

macro_rules! impl_row_to_json {
    ($row:ty) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .map(|col| {
                        let idx = col.ordinal();
                        let value = if let Ok(v) = self.try_get::<Option<i64>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<i32>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<f64>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<f32>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<bool>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<String>, _>(idx) {
                            v.map(JsonValue::from)
                        } else if let Ok(v) = self.try_get::<Option<Vec<u8>>, _>(idx) {
                            v.map(|bytes| JsonValue::from(STANDARD.encode(bytes)))
                        } else {
                            None
                        };
                        (col.name().to_string(), value.unwrap_or(JsonValue::Null))
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(SqliteRow);
impl_row_to_json!(PgRow);
impl_row_to_json!(MySqlRow);
