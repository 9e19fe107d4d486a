use crate::context::Context;
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::executor::{RowIter, VecRowIter};
use parking_lot::RwLock;
use std::sync::Arc;

pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &Schema;

    fn row_iter(&self, ctx: &Context) -> Result<Box<dyn RowIter>>;

    /// The wrapped table, for tables that decorate another one.
    fn underlying(&self) -> Option<Arc<dyn Table>> {
        None
    }

    /// Tables that accept UPDATE return themselves here.
    fn as_updatable(self: Arc<Self>) -> Option<Arc<dyn UpdatableTable>> {
        None
    }
}

pub trait UpdatableTable: Table {
    fn updater(&self, ctx: &Context) -> Box<dyn RowUpdater>;
}

/// Commits old-row → new-row replacements against a table.
pub trait RowUpdater: Send {
    fn update(&mut self, ctx: &Context, old: &[Value], new: &[Value]) -> Result<()>;

    fn close(&mut self, ctx: &Context) -> Result<()>;
}

/// A table kept entirely in memory.
pub struct MemoryTable {
    name: String,
    schema: Schema,
    rows: Arc<RwLock<Vec<Row>>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn insert(&self, row: Row) -> Result<()> {
        self.schema.validate_row(&row)?;
        self.rows.write().push(row);
        Ok(())
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.read().clone()
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_iter(&self, _ctx: &Context) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(VecRowIter::new(self.rows())))
    }

    fn as_updatable(self: Arc<Self>) -> Option<Arc<dyn UpdatableTable>> {
        Some(self)
    }
}

impl UpdatableTable for MemoryTable {
    fn updater(&self, _ctx: &Context) -> Box<dyn RowUpdater> {
        Box::new(MemoryRowUpdater {
            table: self.name.clone(),
            schema: self.schema.clone(),
            rows: Arc::clone(&self.rows),
        })
    }
}

struct MemoryRowUpdater {
    table: String,
    schema: Schema,
    rows: Arc<RwLock<Vec<Row>>>,
}

impl RowUpdater for MemoryRowUpdater {
    fn update(&mut self, _ctx: &Context, old: &[Value], new: &[Value]) -> Result<()> {
        self.schema.validate_row(new)?;

        let mut rows = self.rows.write();
        for row in rows.iter_mut() {
            if self.schema.rows_equal(row, old)? {
                *row = new.to_vec();
                return Ok(());
            }
        }

        Err(DbError::ExecutionError(format!(
            "Row to update not found in table '{}'",
            self.table
        )))
    }

    fn close(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}

/// Exposes another table under a different name (`FROM t AS alias`).
pub struct AliasedTable {
    alias: String,
    inner: Arc<dyn Table>,
}

impl AliasedTable {
    pub fn new(alias: impl Into<String>, inner: Arc<dyn Table>) -> Self {
        Self {
            alias: alias.into(),
            inner,
        }
    }
}

impl Table for AliasedTable {
    fn name(&self) -> &str {
        &self.alias
    }

    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn row_iter(&self, ctx: &Context) -> Result<Box<dyn RowIter>> {
        self.inner.row_iter(ctx)
    }

    fn underlying(&self) -> Option<Arc<dyn Table>> {
        Some(self.inner.clone())
    }
}
