pub mod iter;
pub mod relational;
pub mod span_iter;
pub mod update;

pub use iter::{RowIter, VecRowIter, collect_rows};
pub use relational::{FilterIter, LimitIter};
pub use span_iter::{SpanIter, new_span_iter};
pub use update::{
    UpdateInfo, UpdateIter, UpdateSourceIter, apply_update_expressions, execute_update,
    split_update_row,
};
