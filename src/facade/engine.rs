use super::config::EngineConfig;
use crate::catalog::{ProcedureCache, ViewRegistry};
use crate::context::{Clock, Context, ContextOption, MemoryManager, SystemClock};
use crate::core::Result;
use crate::session::{BaseSession, Session, next_session_id};
use crate::trace::{NoopTracer, Tracer, TracingTracer};
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Process-level owner of everything statements share.
///
/// Sessions and contexts created here all point at the same registries,
/// memory manager, tracer and clock. Every context runs under a child of the
/// engine's root token, so [`Engine::shutdown`] cancels all in-flight work.
pub struct Engine {
    config: EngineConfig,
    procedures: Arc<ProcedureCache>,
    views: Arc<ViewRegistry>,
    memory: Arc<MemoryManager>,
    tracer: Arc<dyn Tracer>,
    clock: Arc<dyn Clock>,
    next_pid: AtomicU64,
    root: CancellationToken,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let tracer: Arc<dyn Tracer> = if config.tracing {
            Arc::new(TracingTracer)
        } else {
            Arc::new(NoopTracer)
        };

        info!(
            "Engine starting at {} (default database '{}')",
            config.server_address, config.default_database
        );

        Ok(Self {
            memory: Arc::new(MemoryManager::new(config.max_memory_bytes)),
            procedures: Arc::new(ProcedureCache::new()),
            views: Arc::new(ViewRegistry::new()),
            tracer,
            clock: Arc::new(SystemClock),
            next_pid: AtomicU64::new(1),
            root: CancellationToken::new(),
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
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

    /// Opens a session for a new client connection, applying the configured
    /// variable overrides and default database.
    pub fn new_session(&self, client_addr: &str, user: &str) -> Result<Arc<BaseSession>> {
        let session = BaseSession::new(
            &self.config.server_address,
            client_addr,
            user,
            next_session_id(),
        );
        for (name, typed) in self.config.session_overrides()? {
            session.set(&name, typed.data_type, typed.value)?;
        }
        if !self.config.default_database.is_empty() {
            session.set_current_database(&self.config.default_database);
        }

        info!("Session {} opened for {}@{}", session.id(), user, client_addr);
        Ok(Arc::new(session))
    }

    /// Builds the context for one statement of `session`.
    pub fn new_context(&self, session: Arc<dyn Session>, query: &str) -> Context {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        debug!("Session {} starts query {}", session.id(), pid);

        Context::new(
            self.root.child_token(),
            [
                ContextOption::Session(session),
                ContextOption::ProcedureCache(self.procedures.clone()),
                ContextOption::ViewRegistry(self.views.clone()),
                ContextOption::Memory(self.memory.clone()),
                ContextOption::Tracer(self.tracer.clone()),
                ContextOption::Clock(self.clock.clone()),
                ContextOption::Pid(pid),
                ContextOption::Query(query.to_string()),
            ],
        )
    }

    /// Cancels every context created by this engine.
    pub fn shutdown(&self) {
        info!("Engine shutting down");
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
