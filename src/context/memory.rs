use crate::core::{DbError, Result, Row, estimated_row_bytes};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reports how much memory the process considers in use.
pub trait MemoryReporter: Send + Sync {
    fn used_memory(&self) -> u64;
}

/// Reporter that only knows about bytes reserved through a [`MemoryManager`].
#[derive(Debug, Default)]
pub struct TrackedMemory {
    reserved: AtomicU64,
}

impl MemoryReporter for TrackedMemory {
    fn used_memory(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }
}

/// Memory accounting shared by every context of an engine.
pub struct MemoryManager {
    tracked: Arc<TrackedMemory>,
    /// `None` when only this manager's own reservations count.
    reporter: Option<Arc<dyn MemoryReporter>>,
    max_memory: Option<u64>,
}

impl MemoryManager {
    /// Creates a manager that reports only its own reservations.
    pub fn new(max_memory: Option<u64>) -> Self {
        Self {
            tracked: Arc::new(TrackedMemory::default()),
            reporter: None,
            max_memory,
        }
    }

    /// Creates a manager that checks the ceiling against an external reporter.
    pub fn with_reporter(reporter: Arc<dyn MemoryReporter>, max_memory: Option<u64>) -> Self {
        Self {
            tracked: Arc::new(TrackedMemory::default()),
            reporter: Some(reporter),
            max_memory,
        }
    }

    pub fn max_memory(&self) -> Option<u64> {
        self.max_memory
    }

    /// Bytes reserved through this manager.
    pub fn reserved(&self) -> u64 {
        self.tracked.used_memory()
    }

    /// Bytes in use according to the reporter.
    pub fn used(&self) -> u64 {
        match &self.reporter {
            Some(reporter) => reporter.used_memory(),
            None => self.tracked.used_memory(),
        }
    }

    pub fn has_available(&self) -> bool {
        match self.max_memory {
            Some(max) => self.used() < max,
            None => true,
        }
    }

    pub fn reserve(&self, bytes: u64) -> Result<()> {
        let Some(max) = self.max_memory else {
            self.tracked.reserved.fetch_add(bytes, Ordering::AcqRel);
            return Ok(());
        };

        let out_of_memory = |used: u64| DbError::OutOfMemory {
            requested: bytes,
            available: max.saturating_sub(used),
        };

        match &self.reporter {
            // check and add in one step so concurrent reservations cannot overshoot
            None => self
                .tracked
                .reserved
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    current.checked_add(bytes).filter(|next| *next <= max)
                })
                .map(|_| ())
                .map_err(out_of_memory),
            // an external reporter is sampled, not reserved against
            Some(reporter) => {
                let used = reporter.used_memory();
                if used.saturating_add(bytes) > max {
                    return Err(out_of_memory(used));
                }
                self.tracked.reserved.fetch_add(bytes, Ordering::AcqRel);
                Ok(())
            }
        }
    }

    pub fn reserve_row(&self, row: &Row) -> Result<u64> {
        let bytes = estimated_row_bytes(row) as u64;
        self.reserve(bytes)?;
        Ok(bytes)
    }

    pub fn release(&self, bytes: u64) {
        let _ = self
            .tracked
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(None)
    }
}
