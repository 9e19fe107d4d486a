pub mod node;
pub mod resolve;

pub use node::{Node, UpdateCapability};
pub use resolve::{resolve_procedure, resolve_view};
