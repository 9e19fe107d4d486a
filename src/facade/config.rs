use crate::core::{DataType, DbError, Result, Value};
use crate::session::{TypedValue, default_session_value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Engine configuration
///
/// Can be built in code with the builder methods or loaded from JSON:
///
/// ```ignore
/// {
///     "server_address": "127.0.0.1:3306",
///     "default_database": "shop",
///     "tracing": true,
///     "max_memory_bytes": 1073741824,
///     "session_variables": { "sql_select_limit": 100 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Address reported by every session
    pub server_address: String,

    /// Database new sessions start in
    pub default_database: String,

    /// Emit statement spans through `tracing`
    pub tracing: bool,

    /// Memory ceiling for row buffers (unlimited when unset)
    pub max_memory_bytes: Option<u64>,

    /// Session variables that override the built-in defaults
    pub session_variables: BTreeMap<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost:3306".to_string(),
            default_database: String::new(),
            tracing: false,
            max_memory_bytes: None,
            session_variables: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server address
    pub fn server_address(mut self, address: &str) -> Self {
        self.server_address = address.to_string();
        self
    }

    /// Set the default database
    pub fn default_database(mut self, database: &str) -> Self {
        self.default_database = database.to_string();
        self
    }

    /// Enable or disable span tracing
    pub fn tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    /// Set the memory ceiling
    pub fn max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Override a session variable default
    pub fn session_variable(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.session_variables.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_memory_bytes == Some(0) {
            return Err(DbError::ConfigError(
                "max_memory_bytes must be greater than zero".to_string(),
            ));
        }
        self.session_overrides().map(|_| ())
    }

    /// Session variable overrides converted to typed values.
    ///
    /// Variables from the default catalog keep their declared type and the
    /// value must fit it. Unknown variables take the type of the JSON value.
    pub fn session_overrides(&self) -> Result<Vec<(String, TypedValue)>> {
        self.session_variables
            .iter()
            .map(|(name, json)| {
                let name = name.to_lowercase();
                let value = json_to_value(&name, json)?;
                let data_type = match default_session_value(&name) {
                    Some(default) => default.data_type,
                    None => inferred_type(&value),
                };
                if !data_type.is_compatible(&value) {
                    return Err(DbError::ConfigError(format!(
                        "session variable '{}' expects {}, got {}",
                        name,
                        data_type,
                        value.type_name()
                    )));
                }
                Ok((name, TypedValue::new(data_type, value)))
            })
            .collect()
    }
}

fn json_to_value(name: &str, json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n.as_f64().map(Value::Float).ok_or_else(|| {
                DbError::ConfigError(format!("session variable '{}' is out of range", name))
            }),
        },
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(DbError::ConfigError(
            format!("session variable '{}' must be a scalar", name),
        )),
    }
}

fn inferred_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Boolean(_) => DataType::Boolean,
        Value::Integer(_) => DataType::Int64,
        Value::Float(_) => DataType::Float,
        Value::Text(_) | Value::Tuple(_) => DataType::LongText,
    }
}
