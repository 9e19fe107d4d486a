use super::{RowIter, new_span_iter};
use crate::context::Context;
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::expression::ExprRef;
use crate::planner::Node;
use crate::session::ROW_COUNT;
use crate::storage::RowUpdater;
use crate::trace::LogField;
use std::fmt;
use tracing::{Level, event};

/// Result summary of an UPDATE statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    pub matched: u64,
    pub updated: u64,
    pub warnings: u64,
}

impl fmt::Display for UpdateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rows matched: {}  Changed: {}  Warnings: {}",
            self.matched, self.updated, self.warnings
        )
    }
}

/// Splits an `old ‖ new` row at its midpoint.
pub fn split_update_row(row: &[Value]) -> (&[Value], &[Value]) {
    row.split_at(row.len() / 2)
}

/// Applies the update expressions in order, each one seeing the row produced
/// by the previous one.
pub fn apply_update_expressions(ctx: &Context, update_exprs: &[ExprRef], row: &Row) -> Result<Row> {
    let mut prev = row.clone();
    for update_expr in update_exprs {
        let value = update_expr.eval(ctx, &prev)?;
        prev = value.into_tuple().map_err(|other| {
            DbError::TypeMismatch(format!(
                "attempted to set field but expression returned {}",
                other.type_name()
            ))
        })?;
    }
    Ok(prev)
}

/// Consumes `old ‖ new` rows from its child and writes the changed ones.
///
/// Unchanged pairs skip the write but are still yielded, so callers can tell
/// matched rows from changed rows.
pub struct UpdateIter {
    child: Box<dyn RowIter>,
    schema: Schema,
    updater: Box<dyn RowUpdater>,
    closed: bool,
}

impl UpdateIter {
    pub fn new(child: Box<dyn RowIter>, schema: Schema, updater: Box<dyn RowUpdater>) -> Self {
        Self {
            child,
            schema,
            updater,
            closed: false,
        }
    }
}

impl UpdateIter {
    fn write_if_changed(&mut self, ctx: &Context, old_and_new: &[Value]) -> Result<()> {
        let (old_row, new_row) = split_update_row(old_and_new);
        if !self.schema.rows_equal(old_row, new_row)? {
            self.updater.update(ctx, old_row, new_row)?;
        }
        Ok(())
    }
}

impl RowIter for UpdateIter {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        let Some(old_and_new) = self.child.next(ctx)? else {
            return Ok(None);
        };

        let width = self.schema.column_count();
        if old_and_new.len() != 2 * width {
            return Err(DbError::ExecutionError(format!(
                "update expected rows of {} values (old and new), got {}",
                2 * width,
                old_and_new.len()
            )));
        }

        // the pair is held against the memory ceiling while it is written
        let reserved = ctx.memory().reserve_row(&old_and_new)?;
        let written = self.write_if_changed(ctx, &old_and_new);
        ctx.memory().release(reserved);
        written?;

        Ok(Some(old_and_new))
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let updater_closed = self.updater.close(ctx);
        let child_closed = self.child.close(ctx);
        updater_closed?;
        child_closed
    }
}

/// Turns each source row into `row ‖ updated row`.
pub struct UpdateSourceIter {
    child: Box<dyn RowIter>,
    update_exprs: Vec<ExprRef>,
}

impl UpdateSourceIter {
    pub fn new(child: Box<dyn RowIter>, update_exprs: Vec<ExprRef>) -> Self {
        Self {
            child,
            update_exprs,
        }
    }
}

impl RowIter for UpdateSourceIter {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        let Some(old_row) = self.child.next(ctx)? else {
            return Ok(None);
        };
        let mut new_row = apply_update_expressions(ctx, &self.update_exprs, &old_row)?;

        let mut old_and_new = old_row;
        old_and_new.append(&mut new_row);
        Ok(Some(old_and_new))
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        self.child.close(ctx)
    }
}

/// Runs an [`Node::Update`] to completion and reports what it did.
///
/// The statement runs inside a `plan.Update` span and checks for cancellation
/// before every row. On success the number of changed rows becomes the
/// session's `row_count`, and only warnings raised while it ran are counted.
pub fn execute_update(ctx: &Context, node: &Node) -> Result<UpdateInfo> {
    if !matches!(node, Node::Update { .. }) {
        return Err(DbError::UnsupportedOperation(format!(
            "cannot execute {} as UPDATE",
            node.name()
        )));
    }

    let schema = node.find_updatable()?.schema().clone();
    let (span, ctx) = ctx.span("plan.Update");
    let iter = match node.row_iter(&ctx) {
        Ok(iter) => iter,
        Err(err) => {
            span.finish_with_fields(vec![LogField::string("error", err.to_string())]);
            return Err(err);
        }
    };
    let mut iter = new_span_iter(span, iter);

    let session = ctx.session();
    let warnings_before = session.warning_count();

    let mut info = UpdateInfo::default();
    let drained = drain_update(&ctx, iter.as_mut(), &schema, &mut info);
    let closed = iter.close(&ctx);
    if let Err(err) = &drained {
        event!(Level::DEBUG, error = %err, matched = info.matched, "update aborted");
    }
    drained?;
    closed?;

    session.set_last_query_info(ROW_COUNT, info.updated as i64);
    info.warnings = u64::from(session.warning_count().saturating_sub(warnings_before));

    event!(
        Level::DEBUG,
        pid = ctx.pid(),
        matched = info.matched,
        updated = info.updated,
        "update finished"
    );
    Ok(info)
}

fn drain_update(
    ctx: &Context,
    iter: &mut dyn RowIter,
    schema: &Schema,
    info: &mut UpdateInfo,
) -> Result<()> {
    loop {
        ctx.check_cancelled()?;
        let Some(row) = iter.next(ctx)? else {
            return Ok(());
        };

        info.matched += 1;
        let (old_row, new_row) = split_update_row(&row);
        if !schema.rows_equal(old_row, new_row)? {
            info.updated += 1;
        }
    }
}
