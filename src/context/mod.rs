//! Per-statement execution context.
//!
//! A [`Context`] is built fresh for every statement (or sub-task) and bundles
//! the cancellable [`Scope`] the statement runs in with handles to state that
//! outlives it: the connection's [`Session`], the catalog registries, memory
//! accounting, the tracer and the clock. Deriving a context through
//! [`Context::span`] or [`Context::new_sub_context`] shares every handle and
//! only swaps the scope.

pub mod clock;
pub mod memory;

use crate::catalog::{ProcedureCache, ViewRegistry};
use crate::core::{DbError, Result};
use crate::session::{BaseSession, Session, Warning, WarningLevel};
use crate::trace::{NoopTracer, Span, Tracer};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use memory::{MemoryManager, MemoryReporter, TrackedMemory};

/// The cancellable part of a context: what differs between derived contexts.
#[derive(Clone)]
pub struct Scope {
    token: CancellationToken,
    span: Option<Arc<dyn Span>>,
    deadline: Option<DateTime<Utc>>,
}

impl Scope {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            span: None,
            deadline: None,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn span(&self) -> Option<&Arc<dyn Span>> {
        self.span.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}

/// Cancels a sub-context's scope when dropped or when [`cancel`](Self::cancel) is called.
#[must_use = "dropping the handle cancels the sub-context immediately"]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Configures a context under construction. Options apply in order, later ones win.
pub enum ContextOption {
    Session(Arc<dyn Session>),
    ProcedureCache(Arc<ProcedureCache>),
    ViewRegistry(Arc<ViewRegistry>),
    Memory(Arc<MemoryManager>),
    Tracer(Arc<dyn Tracer>),
    RootSpan(Arc<dyn Span>),
    Clock(Arc<dyn Clock>),
    Pid(u64),
    Query(String),
}

struct ContextParts {
    session: Option<Arc<dyn Session>>,
    procedures: Option<Arc<ProcedureCache>>,
    views: Option<Arc<ViewRegistry>>,
    memory: Option<Arc<MemoryManager>>,
    tracer: Arc<dyn Tracer>,
    root_span: Option<Arc<dyn Span>>,
    clock: Arc<dyn Clock>,
    pid: u64,
    query: Arc<str>,
    query_time: Option<DateTime<Utc>>,
}

impl Default for ContextParts {
    fn default() -> Self {
        Self {
            session: None,
            procedures: None,
            views: None,
            memory: None,
            tracer: Arc::new(NoopTracer),
            root_span: None,
            clock: Arc::new(SystemClock),
            pid: 0,
            query: Arc::from(""),
            query_time: None,
        }
    }
}

impl ContextParts {
    fn apply(&mut self, opt: ContextOption) {
        match opt {
            ContextOption::Session(session) => self.session = Some(session),
            ContextOption::ProcedureCache(cache) => self.procedures = Some(cache),
            ContextOption::ViewRegistry(registry) => self.views = Some(registry),
            ContextOption::Memory(memory) => self.memory = Some(memory),
            ContextOption::Tracer(tracer) => self.tracer = tracer,
            ContextOption::RootSpan(span) => self.root_span = Some(span),
            ContextOption::Clock(clock) => {
                self.clock = clock;
                self.query_time = None;
            }
            ContextOption::Pid(pid) => self.pid = pid,
            ContextOption::Query(query) => self.query = Arc::from(query),
        }
    }

    fn build(self, scope: Scope) -> Context {
        let query_time = self.query_time.unwrap_or_else(|| self.clock.now());
        Context {
            scope,
            session: self.session.unwrap_or_else(|| Arc::new(BaseSession::empty())),
            procedures: self.procedures.unwrap_or_default(),
            views: self.views.unwrap_or_default(),
            memory: self.memory.unwrap_or_default(),
            tracer: self.tracer,
            root_span: self.root_span,
            clock: self.clock,
            pid: self.pid,
            query: self.query,
            query_time,
        }
    }
}

/// Context of a query execution.
#[derive(Clone)]
pub struct Context {
    scope: Scope,
    session: Arc<dyn Session>,
    procedures: Arc<ProcedureCache>,
    views: Arc<ViewRegistry>,
    memory: Arc<MemoryManager>,
    tracer: Arc<dyn Tracer>,
    root_span: Option<Arc<dyn Span>>,
    clock: Arc<dyn Clock>,
    pid: u64,
    query: Arc<str>,
    query_time: DateTime<Utc>,
}

impl Context {
    /// Creates a context running under `token`.
    ///
    /// Without options the context gets an empty [`BaseSession`], a
    /// [`NoopTracer`], the system clock, fresh registries and an unbounded
    /// memory manager.
    pub fn new(token: CancellationToken, opts: impl IntoIterator<Item = ContextOption>) -> Self {
        let mut parts = ContextParts::default();
        for opt in opts {
            parts.apply(opt);
        }
        parts.build(Scope::new(token))
    }

    /// A default context with its own root cancellation scope.
    pub fn empty() -> Self {
        Self::new(CancellationToken::new(), [])
    }

    /// Applies further options in place. Intended for tests; the query time
    /// is only recomputed when the clock changes.
    pub fn apply_opts(&mut self, opts: impl IntoIterator<Item = ContextOption>) {
        let mut parts = ContextParts {
            session: Some(self.session.clone()),
            procedures: Some(self.procedures.clone()),
            views: Some(self.views.clone()),
            memory: Some(self.memory.clone()),
            tracer: self.tracer.clone(),
            root_span: self.root_span.clone(),
            clock: self.clock.clone(),
            pid: self.pid,
            query: self.query.clone(),
            query_time: Some(self.query_time),
        };
        for opt in opts {
            parts.apply(opt);
        }
        *self = parts.build(self.scope.clone());
    }

    fn with_derived_scope(&self, scope: Scope) -> Context {
        Context {
            scope,
            ..self.clone()
        }
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn procedures(&self) -> &Arc<ProcedureCache> {
        &self.procedures
    }

    pub fn views(&self) -> &Arc<ViewRegistry> {
        &self.views
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Process id associated with this context.
    pub fn pid(&self) -> u64 {
        self.pid
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// When the context for this query was created.
    pub fn query_time(&self) -> DateTime<Utc> {
        self.query_time
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn root_span(&self) -> Option<&Arc<dyn Span>> {
        self.root_span.as_ref()
    }

    /// Innermost span opened through [`span`](Self::span), if any.
    pub fn current_span(&self) -> Option<&Arc<dyn Span>> {
        self.scope.span.as_ref()
    }

    /// Starts a span as a child of the current one and returns it together
    /// with a context to hand to everything running inside it.
    pub fn span(&self, operation: &str) -> (Arc<dyn Span>, Context) {
        let parent = self.scope.span.as_deref();
        let span = self.tracer.start_span(operation, parent);
        let scope = Scope {
            span: Some(span.clone()),
            ..self.scope.clone()
        };
        (span, self.with_derived_scope(scope))
    }

    /// Creates a child context that can be cancelled on its own.
    ///
    /// Cancelling the parent cancels the child; the returned handle cancels
    /// only the child and does so at the latest when it is dropped.
    pub fn new_sub_context(&self) -> (Context, CancelHandle) {
        let token = self.scope.token.child_token();
        let scope = Scope {
            token: token.clone(),
            ..self.scope.clone()
        };
        (self.with_derived_scope(scope), CancelHandle { token })
    }

    /// Like [`new_sub_context`](Self::new_sub_context), with a deadline
    /// `timeout` from now. An earlier inherited deadline is kept.
    pub fn new_sub_context_with_timeout(&self, timeout: chrono::Duration) -> (Context, CancelHandle) {
        let (mut ctx, handle) = self.new_sub_context();
        let candidate = self.clock.now().checked_add_signed(timeout);
        ctx.scope.deadline = match (self.scope.deadline, candidate) {
            (Some(inherited), Some(candidate)) => Some(inherited.min(candidate)),
            (inherited, candidate) => inherited.or(candidate),
        };
        (ctx, handle)
    }

    /// Returns this context running under a different cancellation scope.
    pub fn with_scope(&self, token: CancellationToken) -> Context {
        self.with_derived_scope(Scope::new(token))
    }

    pub fn with_current_db(&self, db_name: &str) -> &Self {
        self.session.set_current_database(db_name);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.check_cancelled().is_err()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.scope.token.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        if let Some(deadline) = self.scope.deadline
            && self.clock.now() >= deadline
        {
            return Err(DbError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the scope is cancelled or its deadline passes, returning
    /// the corresponding error.
    pub async fn cancelled(&self) -> DbError {
        let Some(deadline) = self.scope.deadline else {
            self.scope.token.cancelled().await;
            return DbError::Cancelled;
        };

        tokio::select! {
            biased;
            _ = self.scope.token.cancelled() => DbError::Cancelled,
            _ = self.clock.sleep_until(deadline) => DbError::DeadlineExceeded,
        }
    }

    /// Adds an error-level entry to the session's warnings.
    pub fn error(&self, code: u32, message: impl Into<String>) {
        self.session.warn(Warning::new(WarningLevel::Error, code, message));
    }

    /// Adds a warning to the session.
    pub fn warn(&self, code: u32, message: impl Into<String>) {
        self.session.warn(Warning::new(WarningLevel::Warning, code, message));
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("pid", &self.pid)
            .field("query", &self.query)
            .field("query_time", &self.query_time)
            .field("session_id", &self.session.id())
            .field("cancelled", &self.scope.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
