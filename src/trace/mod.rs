//! Tracer abstraction used by [`Context::span`](crate::context::Context::span).
//!
//! Three implementations ship with the crate:
//! - [`NoopTracer`]: the default; its spans record nothing and iterators
//!   wrapped in a no-op span are returned untouched.
//! - [`TracingTracer`]: forwards spans and their finish records to the
//!   `tracing` ecosystem.
//! - [`CollectingTracer`]: keeps finished spans in memory for inspection.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// A key/value pair attached to a span when it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct LogField {
    pub key: &'static str,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl LogField {
    pub fn int(key: &'static str, value: i64) -> Self {
        Self { key, value: FieldValue::Int(value) }
    }

    pub fn string(key: &'static str, value: impl Into<String>) -> Self {
        Self { key, value: FieldValue::Str(value.into()) }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

fn render_fields(fields: &[LogField]) -> String {
    fields
        .iter()
        .map(|field| format!("{}={}", field.key, field.value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A unit of traced work.
pub trait Span: Send + Sync {
    fn operation(&self) -> &str;

    /// No-op spans let callers skip instrumentation entirely.
    fn is_noop(&self) -> bool {
        false
    }

    /// Finishes the span, attaching `fields` as its final log record.
    fn finish_with_fields(&self, fields: Vec<LogField>);

    fn finish(&self) {
        self.finish_with_fields(Vec::new());
    }

    fn as_any(&self) -> &dyn Any;
}

pub trait Tracer: Send + Sync {
    fn start_span(&self, operation: &str, parent: Option<&dyn Span>) -> Arc<dyn Span>;

    fn is_noop(&self) -> bool {
        false
    }
}

// ============================================================================
// No-op
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

#[derive(Debug)]
pub struct NoopSpan {
    operation: String,
}

impl Span for NoopSpan {
    fn operation(&self) -> &str {
        &self.operation
    }

    fn is_noop(&self) -> bool {
        true
    }

    fn finish_with_fields(&self, _fields: Vec<LogField>) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Tracer for NoopTracer {
    fn start_span(&self, operation: &str, _parent: Option<&dyn Span>) -> Arc<dyn Span> {
        Arc::new(NoopSpan { operation: operation.to_string() })
    }

    fn is_noop(&self) -> bool {
        true
    }
}

// ============================================================================
// `tracing` bridge
// ============================================================================

/// Emits one `tracing` span per started span and a DEBUG event on finish.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

pub struct TracingSpan {
    operation: String,
    inner: tracing::Span,
}

impl TracingSpan {
    pub fn inner(&self) -> &tracing::Span {
        &self.inner
    }
}

impl Span for TracingSpan {
    fn operation(&self) -> &str {
        &self.operation
    }

    fn finish_with_fields(&self, fields: Vec<LogField>) {
        let _enter = self.inner.enter();
        if fields.is_empty() {
            event!(Level::DEBUG, operation = %self.operation, "span finished");
        } else {
            event!(
                Level::DEBUG,
                operation = %self.operation,
                fields = %render_fields(&fields),
                "span finished"
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, operation: &str, parent: Option<&dyn Span>) -> Arc<dyn Span> {
        let parent = parent.and_then(|span| span.as_any().downcast_ref::<TracingSpan>());
        let inner = match parent {
            Some(parent) => tracing::info_span!(parent: parent.inner(), "query.span", operation = %operation),
            None => tracing::info_span!("query.span", operation = %operation),
        };
        Arc::new(TracingSpan {
            operation: operation.to_string(),
            inner,
        })
    }
}

// ============================================================================
// In-memory collector
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    pub operation: String,
    pub parent: Option<String>,
    pub fields: Vec<LogField>,
}

impl FinishedSpan {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

/// Records every finished span. Cloning shares the underlying buffer.
#[derive(Debug, Default, Clone)]
pub struct CollectingTracer {
    finished: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl CollectingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.finished.lock().clone()
    }
}

pub struct CollectedSpan {
    operation: String,
    parent: Option<String>,
    sink: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl Span for CollectedSpan {
    fn operation(&self) -> &str {
        &self.operation
    }

    fn finish_with_fields(&self, fields: Vec<LogField>) {
        self.sink.lock().push(FinishedSpan {
            operation: self.operation.clone(),
            parent: self.parent.clone(),
            fields,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Tracer for CollectingTracer {
    fn start_span(&self, operation: &str, parent: Option<&dyn Span>) -> Arc<dyn Span> {
        Arc::new(CollectedSpan {
            operation: operation.to_string(),
            parent: parent.map(|p| p.operation().to_string()),
            sink: Arc::clone(&self.finished),
        })
    }
}
