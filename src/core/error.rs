use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("View '{0}.{1}' already exists")]
    ViewAlreadyExists(String, String),

    #[error("View '{0}.{1}' does not exist")]
    ViewNotFound(String, String),

    #[error("Procedure '{0}.{1}' does not exist")]
    ProcedureNotFound(String, String),

    #[error("Invalid number of children for {node}: got {got}, expected {expected}")]
    InvalidChildCount {
        node: String,
        got: usize,
        expected: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Query was cancelled")]
    Cancelled,

    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    #[error("Out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
