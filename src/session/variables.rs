use super::TypedValue;
use crate::core::{DataType, Value};
use lazy_static::lazy_static;
use std::collections::HashMap;

pub const CURRENT_DB_SESSION_VAR: &str = "current_database";
pub const AUTOCOMMIT_SESSION_VAR: &str = "autocommit";

/// Keys for the per-session last-query counters.
pub const ROW_COUNT: &str = "row_count";
pub const FOUND_ROWS: &str = "found_rows";
pub const LAST_INSERT_ID: &str = "last_insert_id";

const DEFAULT_COLLATION: &str = "utf8mb4_0900_bin";
const DEFAULT_CHARACTER_SET: &str = "utf8mb4";

lazy_static! {
    static ref DEFAULT_SESSION_CONFIG: HashMap<String, TypedValue> = build_default_config();
}

fn text(value: &str) -> TypedValue {
    TypedValue::new(DataType::LongText, Value::Text(value.to_string()))
}

fn build_default_config() -> HashMap<String, TypedValue> {
    let entries = [
        ("auto_increment_increment", TypedValue::new(DataType::Int64, Value::Integer(1))),
        ("time_zone", text("SYSTEM")),
        ("system_time_zone", text("UTC")),
        ("max_allowed_packet", TypedValue::new(DataType::Int32, Value::Integer(i32::MAX as i64))),
        ("sql_mode", text("")),
        ("gtid_mode", TypedValue::new(DataType::Int32, Value::Integer(0))),
        ("collation_database", text(DEFAULT_COLLATION)),
        ("ndbinfo_version", text("")),
        ("sql_select_limit", TypedValue::new(DataType::Int32, Value::Integer(i32::MAX as i64))),
        ("transaction_isolation", text("READ UNCOMMITTED")),
        ("version", text("")),
        ("version_comment", text("")),
        (AUTOCOMMIT_SESSION_VAR, TypedValue::new(DataType::Int8, Value::Integer(0))),
        ("character_set_client", text(DEFAULT_CHARACTER_SET)),
        ("character_set_connection", text(DEFAULT_CHARACTER_SET)),
        ("character_set_results", text(DEFAULT_CHARACTER_SET)),
        ("collation_connection", text(DEFAULT_COLLATION)),
        ("tmpdir", text(&tmpdir_session_var())),
        ("local_infile", TypedValue::new(DataType::Int8, Value::Integer(0))),
        ("secure_file_priv", TypedValue::new(DataType::LongText, Value::Null)),
    ];

    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Default values for every session variable a new session starts with.
pub fn default_session_config() -> HashMap<String, TypedValue> {
    DEFAULT_SESSION_CONFIG.clone()
}

/// Default value of a single session variable, if it belongs to the catalog.
pub fn default_session_value(key: &str) -> Option<&'static TypedValue> {
    DEFAULT_SESSION_CONFIG.get(key)
}

pub(crate) fn default_last_query_info() -> HashMap<String, i64> {
    HashMap::from([
        (ROW_COUNT.to_string(), 0),
        // `SELECT FOUND_ROWS()` before any SELECT reports 1
        (FOUND_ROWS.to_string(), 1),
        (LAST_INSERT_ID.to_string(), 0),
    ])
}

/// Resolves the temporary directory the way MySQL does: TMPDIR, then TEMP, then TMP.
pub fn tmpdir_session_var() -> String {
    ["TMPDIR", "TEMP", "TMP"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}
