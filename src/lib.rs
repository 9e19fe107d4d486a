// ============================================================================
// querycore: per-statement execution context and the UPDATE path
// ============================================================================

pub mod catalog;
pub mod context;
pub mod core;
pub mod executor;
pub mod expression;
pub mod facade;
pub mod planner;
pub mod session;
pub mod storage;
pub mod trace;

// Re-export main types for convenience
pub use crate::catalog::{Procedure, ProcedureCache, View, ViewRegistry};
pub use crate::context::{CancelHandle, Context, ContextOption};
pub use crate::core::{DataType, DbError, Result, Value};
pub use crate::executor::{UpdateInfo, execute_update};
pub use crate::facade::{Engine, EngineConfig};
pub use crate::planner::Node;
pub use crate::session::{BaseSession, Session};
