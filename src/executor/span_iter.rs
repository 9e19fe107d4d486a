use super::RowIter;
use crate::context::Context;
use crate::core::{Result, Row};
use crate::trace::{LogField, Span};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs `iter` inside `span`, timing every row.
///
/// No-op spans return `iter` untouched, so untraced queries pay nothing.
pub fn new_span_iter(span: Arc<dyn Span>, iter: Box<dyn RowIter>) -> Box<dyn RowIter> {
    if span.is_noop() {
        return iter;
    }
    Box::new(SpanIter::new(span, iter))
}

pub struct SpanIter {
    span: Arc<dyn Span>,
    iter: Box<dyn RowIter>,
    count: u64,
    max: Duration,
    min: Duration,
    total: Duration,
    done: bool,
}

impl SpanIter {
    pub fn new(span: Arc<dyn Span>, iter: Box<dyn RowIter>) -> Self {
        Self {
            span,
            iter,
            count: 0,
            max: Duration::ZERO,
            min: Duration::ZERO,
            total: Duration::ZERO,
            done: false,
        }
    }

    fn update_timings(&mut self, elapsed: Duration) {
        if self.max < elapsed {
            self.max = elapsed;
        }
        if self.min > elapsed || self.count == 1 {
            self.min = elapsed;
        }
        self.total += elapsed;
    }

    fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total / count,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
        }
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.span.finish_with_fields(vec![
            LogField::int("rows", self.count as i64),
            LogField::string("total_time", format!("{:?}", self.total)),
            LogField::string("max_time", format!("{:?}", self.max)),
            LogField::string("min_time", format!("{:?}", self.min)),
            LogField::string("avg_time", format!("{:?}", self.average())),
        ]);
    }

    fn finish_with_error(&mut self, err: &dyn std::error::Error) {
        if self.done {
            return;
        }
        self.done = true;
        self.span
            .finish_with_fields(vec![LogField::string("error", err.to_string())]);
    }
}

impl RowIter for SpanIter {
    fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        let start = Instant::now();

        match self.iter.next(ctx) {
            Ok(Some(row)) => {
                self.count += 1;
                self.update_timings(start.elapsed());
                Ok(Some(row))
            }
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(err) => {
                self.finish_with_error(&err);
                Err(err)
            }
        }
    }

    fn close(&mut self, ctx: &Context) -> Result<()> {
        self.finish();
        self.iter.close(ctx)
    }
}
