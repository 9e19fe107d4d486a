use crate::context::Context;
use crate::core::{Result, Row};

/// A pull-based producer of rows.
///
/// `next` returns `Ok(None)` once the rows are exhausted. `close` releases
/// whatever the iterator holds and must be safe to call more than once.
pub trait RowIter: Send {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>>;

    fn close(&mut self, ctx: &Context) -> Result<()>;
}

impl RowIter for Box<dyn RowIter> {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        (**self).next(ctx)
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        (**self).close(ctx)
    }
}

/// Yields rows from an owned buffer.
pub struct VecRowIter {
    rows: std::vec::IntoIter<Row>,
}

impl VecRowIter {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowIter for VecRowIter {
    fn next(&mut self, _ctx: &Context) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }

    fn close(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}

/// Drains `iter` and closes it. A close error is reported only when
/// iteration itself succeeded.
pub fn collect_rows(ctx: &Context, mut iter: impl RowIter) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let drained = loop {
        match iter.next(ctx) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    let closed = iter.close(ctx);
    drained?;
    closed?;
    Ok(rows)
}
