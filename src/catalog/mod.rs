pub mod procedure;
pub mod procedure_cache;
pub mod view_registry;

pub use procedure::{Arity, ParamDirection, Procedure, ProcedureParam, compare_overloads};
pub use procedure_cache::ProcedureCache;
pub use view_registry::{View, ViewRegistry};
