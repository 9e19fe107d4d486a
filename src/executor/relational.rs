use super::RowIter;
use crate::context::Context;
use crate::core::{Result, Row, Value};
use crate::expression::ExprRef;

/// Passes through rows for which `predicate` evaluates to TRUE.
/// NULL and FALSE both drop the row.
pub struct FilterIter {
    child: Box<dyn RowIter>,
    predicate: ExprRef,
}

impl FilterIter {
    pub fn new(child: Box<dyn RowIter>, predicate: ExprRef) -> Self {
        Self { child, predicate }
    }
}

impl RowIter for FilterIter {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        while let Some(row) = self.child.next(ctx)? {
            if let Value::Boolean(true) = self.predicate.eval(ctx, &row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        self.child.close(ctx)
    }
}

pub struct LimitIter {
    child: Box<dyn RowIter>,
    remaining: usize,
}

impl LimitIter {
    pub fn new(child: Box<dyn RowIter>, limit: usize) -> Self {
        Self {
            child,
            remaining: limit,
        }
    }
}

impl RowIter for LimitIter {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let row = self.child.next(ctx)?;
        if row.is_some() {
            self.remaining -= 1;
        }
        Ok(row)
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        self.child.close(ctx)
    }
}
