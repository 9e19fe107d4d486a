pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{Column, Row, Schema, estimated_row_bytes};
pub use value::{DataType, Value};
