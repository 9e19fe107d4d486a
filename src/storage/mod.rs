pub mod table;

pub use table::{AliasedTable, MemoryTable, RowUpdater, Table, UpdatableTable};
