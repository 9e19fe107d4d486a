use crate::context::Context;
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::executor::{
    FilterIter, LimitIter, RowIter, UpdateIter, UpdateSourceIter, VecRowIter,
};
use crate::expression::{Equals, ExprRef, GetField, Literal};
use crate::storage::{Table, UpdatableTable};
use std::fmt;
use std::sync::Arc;

/// A node of an execution plan.
#[derive(Clone)]
pub enum Node {
    /// A table bound to its database.
    ResolvedTable {
        database: String,
        table: Arc<dyn Table>,
    },
    /// A table reference the analyzer has not bound yet.
    UnresolvedTable { database: String, name: String },
    /// Point lookup on `column = key` over a resolved table.
    IndexedTableAccess {
        child: Box<Node>,
        column: usize,
        key: Value,
    },
    Filter {
        predicate: ExprRef,
        child: Box<Node>,
    },
    Limit { limit: usize, child: Box<Node> },
    /// Produces `old ‖ new` rows by applying the SET expressions to each child row.
    UpdateSource {
        update_exprs: Vec<ExprRef>,
        child: Box<Node>,
    },
    Update { child: Box<Node> },
    Values { schema: Schema, rows: Vec<Row> },
}

/// How a node answers "which table does an UPDATE over you write to?".
pub enum UpdateCapability {
    Updatable(Arc<dyn UpdatableTable>),
    /// Ask the child at this index.
    Delegate(usize),
    Unsupported,
}

impl Node {
    pub fn resolved_table(database: impl Into<String>, table: Arc<dyn Table>) -> Self {
        Node::ResolvedTable {
            database: database.into(),
            table,
        }
    }

    pub fn filter(predicate: ExprRef, child: Node) -> Self {
        Node::Filter {
            predicate,
            child: Box::new(child),
        }
    }

    pub fn limit(limit: usize, child: Node) -> Self {
        Node::Limit {
            limit,
            child: Box::new(child),
        }
    }

    pub fn indexed_access(child: Node, column: usize, key: Value) -> Self {
        Node::IndexedTableAccess {
            child: Box::new(child),
            column,
            key,
        }
    }

    /// `UPDATE <child> SET <update_exprs>`.
    pub fn update(child: Node, update_exprs: Vec<ExprRef>) -> Self {
        Node::Update {
            child: Box::new(Node::UpdateSource {
                update_exprs,
                child: Box::new(child),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Node::ResolvedTable { .. } => "ResolvedTable",
            Node::UnresolvedTable { .. } => "UnresolvedTable",
            Node::IndexedTableAccess { .. } => "IndexedTableAccess",
            Node::Filter { .. } => "Filter",
            Node::Limit { .. } => "Limit",
            Node::UpdateSource { .. } => "UpdateSource",
            Node::Update { .. } => "Update",
            Node::Values { .. } => "Values",
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::ResolvedTable { .. } | Node::UnresolvedTable { .. } | Node::Values { .. } => {
                Vec::new()
            }
            Node::IndexedTableAccess { child, .. }
            | Node::Filter { child, .. }
            | Node::Limit { child, .. }
            | Node::UpdateSource { child, .. }
            | Node::Update { child } => vec![child.as_ref()],
        }
    }

    /// Returns a copy of this node over new children.
    pub fn with_children(&self, mut children: Vec<Node>) -> Result<Node> {
        let expected = self.children().len();
        if children.len() != expected {
            return Err(DbError::InvalidChildCount {
                node: self.name().to_string(),
                got: children.len(),
                expected,
            });
        }

        let mut node = self.clone();
        if let Some(new_child) = children.pop() {
            match &mut node {
                Node::IndexedTableAccess { child, .. }
                | Node::Filter { child, .. }
                | Node::Limit { child, .. }
                | Node::UpdateSource { child, .. }
                | Node::Update { child } => **child = new_child,
                Node::ResolvedTable { .. } | Node::UnresolvedTable { .. } | Node::Values { .. } => {}
            }
        }
        Ok(node)
    }

    pub fn update_capability(&self) -> UpdateCapability {
        match self {
            Node::ResolvedTable { table, .. } => match updatable_table(table.clone()) {
                Some(updatable) => UpdateCapability::Updatable(updatable),
                None => UpdateCapability::Unsupported,
            },
            Node::IndexedTableAccess { .. }
            | Node::Filter { .. }
            | Node::Limit { .. }
            | Node::UpdateSource { .. }
            | Node::Update { .. } => UpdateCapability::Delegate(0),
            Node::UnresolvedTable { .. } | Node::Values { .. } => UpdateCapability::Unsupported,
        }
    }

    /// Finds the table an UPDATE over this node writes to.
    pub fn find_updatable(&self) -> Result<Arc<dyn UpdatableTable>> {
        let mut node = self;
        loop {
            match node.update_capability() {
                UpdateCapability::Updatable(table) => return Ok(table),
                UpdateCapability::Delegate(index) => match node.children().get(index) {
                    Some(child) => node = *child,
                    None => break,
                },
                UpdateCapability::Unsupported => break,
            }
        }
        Err(DbError::UnsupportedOperation(
            "table doesn't support UPDATE".to_string(),
        ))
    }

    /// Database the statement targets, or an empty string if no table is named.
    pub fn database(&self) -> &str {
        match self {
            Node::ResolvedTable { database, .. } | Node::UnresolvedTable { database, .. } => database,
            Node::IndexedTableAccess { child, .. }
            | Node::Filter { child, .. }
            | Node::Limit { child, .. }
            | Node::UpdateSource { child, .. }
            | Node::Update { child } => child.database(),
            Node::Values { .. } => "",
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            Node::ResolvedTable { table, .. } => table.schema().clone(),
            Node::UnresolvedTable { .. } => Schema::default(),
            Node::IndexedTableAccess { child, .. }
            | Node::Filter { child, .. }
            | Node::Limit { child, .. }
            | Node::Update { child } => child.schema(),
            Node::UpdateSource { child, .. } => child.schema().doubled(),
            Node::Values { schema, .. } => schema.clone(),
        }
    }

    pub fn row_iter(&self, ctx: &Context) -> Result<Box<dyn RowIter>> {
        match self {
            Node::ResolvedTable { table, .. } => table.row_iter(ctx),
            Node::UnresolvedTable { name, .. } => Err(DbError::ExecutionError(format!(
                "table '{}' has not been resolved",
                name
            ))),
            Node::IndexedTableAccess { child, column, key } => {
                let field = child
                    .schema()
                    .columns()
                    .get(*column)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                let lookup = Arc::new(Equals::new(
                    Arc::new(GetField::new(*column, field)),
                    Arc::new(Literal(key.clone())),
                ));
                Ok(Box::new(FilterIter::new(child.row_iter(ctx)?, lookup)))
            }
            Node::Filter { predicate, child } => {
                Ok(Box::new(FilterIter::new(child.row_iter(ctx)?, predicate.clone())))
            }
            Node::Limit { limit, child } => Ok(Box::new(LimitIter::new(child.row_iter(ctx)?, *limit))),
            Node::UpdateSource {
                update_exprs,
                child,
            } => Ok(Box::new(UpdateSourceIter::new(
                child.row_iter(ctx)?,
                update_exprs.clone(),
            ))),
            Node::Update { child } => {
                let updatable = child.find_updatable()?;
                let updater = updatable.updater(ctx);
                let schema = updatable.schema().clone();
                Ok(Box::new(UpdateIter::new(child.row_iter(ctx)?, schema, updater)))
            }
            Node::Values { rows, .. } => Ok(Box::new(VecRowIter::new(rows.clone()))),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self {
            Node::ResolvedTable { database, table } => {
                writeln!(f, "{}ResolvedTable({}.{})", indent, database, table.name())?
            }
            Node::UnresolvedTable { database, name } => {
                writeln!(f, "{}UnresolvedTable({}.{})", indent, database, name)?
            }
            Node::IndexedTableAccess { column, key, .. } => {
                writeln!(f, "{}IndexedTableAccess(#{} = {})", indent, column, key)?
            }
            Node::Filter { predicate, .. } => writeln!(f, "{}Filter({})", indent, predicate)?,
            Node::Limit { limit, .. } => writeln!(f, "{}Limit({})", indent, limit)?,
            Node::UpdateSource { update_exprs, .. } => {
                let exprs: Vec<String> = update_exprs.iter().map(|e| e.to_string()).collect();
                writeln!(f, "{}UpdateSource({})", indent, exprs.join(", "))?
            }
            Node::Update { .. } => writeln!(f, "{}Update", indent)?,
            Node::Values { rows, .. } => writeln!(f, "{}Values({} rows)", indent, rows.len())?,
        }
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Unwraps table decorators until one accepts updates.
fn updatable_table(table: Arc<dyn Table>) -> Option<Arc<dyn UpdatableTable>> {
    let underlying = table.underlying();
    match table.as_updatable() {
        Some(updatable) => Some(updatable),
        None => underlying.and_then(updatable_table),
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::executor::collect_rows;
    use crate::storage::{AliasedTable, MemoryTable};

    struct ReadOnlyTable(Schema);

    impl Table for ReadOnlyTable {
        fn name(&self) -> &str {
            "ro"
        }

        fn schema(&self) -> &Schema {
            &self.0
        }

        fn row_iter(&self, _ctx: &Context) -> Result<Box<dyn RowIter>> {
            Ok(Box::new(VecRowIter::new(Vec::new())))
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![Column::new("id", DataType::Int64)])
    }

    fn memory_table() -> Arc<MemoryTable> {
        let table = MemoryTable::new("t", schema());
        for id in 1..=3 {
            table.insert(vec![Value::Integer(id)]).unwrap();
        }
        Arc::new(table)
    }

    #[test]
    fn test_find_updatable_through_wrappers() {
        let aliased: Arc<dyn Table> = Arc::new(AliasedTable::new("a", memory_table()));
        let plan = Node::limit(1, Node::indexed_access(Node::resolved_table("db", aliased), 0, Value::Integer(2)));
        let table = plan.find_updatable().unwrap();
        assert_eq!(table.name(), "t");
    }

    #[test]
    fn test_find_updatable_unsupported() {
        let read_only = Node::resolved_table("db", Arc::new(ReadOnlyTable(schema())));
        let err = Node::filter(Arc::new(Literal(Value::Boolean(true))), read_only)
            .find_updatable()
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Unsupported operation: table doesn't support UPDATE");

        let values = Node::Values {
            schema: schema(),
            rows: vec![],
        };
        assert!(values.find_updatable().is_err());
    }

    #[test]
    fn test_with_children_checks_count() {
        let leaf = Node::resolved_table("db", memory_table());
        let filter = Node::limit(5, leaf.clone());

        let err = filter.with_children(vec![]).unwrap_err();
        assert!(matches!(err, DbError::InvalidChildCount { got: 0, expected: 1, .. }));
        assert!(leaf.with_children(vec![leaf.clone()]).is_err());

        let values = Node::Values {
            schema: schema(),
            rows: vec![vec![Value::Integer(9)]],
        };
        let rebuilt = filter.with_children(vec![values]).unwrap();
        assert_eq!(rebuilt.children()[0].name(), "Values");
    }

    #[test]
    fn test_database() {
        let plan = Node::update(
            Node::resolved_table("shop", memory_table()),
            vec![],
        );
        assert_eq!(plan.database(), "shop");

        let unresolved = Node::UnresolvedTable {
            database: "other".into(),
            name: "x".into(),
        };
        assert_eq!(Node::limit(1, unresolved).database(), "other");
    }

    #[test]
    fn test_indexed_access_and_display() {
        let ctx = Context::empty();
        let plan = Node::indexed_access(Node::resolved_table("db", memory_table()), 0, Value::Integer(2));
        let rows = collect_rows(&ctx, plan.row_iter(&ctx).unwrap()).unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2)]]);
        assert_eq!(
            plan.to_string(),
            "IndexedTableAccess(#0 = 2)\n  ResolvedTable(db.t)\n"
        );
    }

    #[test]
    fn test_update_source_schema_is_doubled() {
        let plan = Node::update(Node::resolved_table("db", memory_table()), vec![]);
        assert_eq!(plan.schema().column_count(), 2);
        assert_eq!(plan.children()[0].name(), "UpdateSource");
    }
}
