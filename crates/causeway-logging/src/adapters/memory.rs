use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::adapter::{AdapterOptions, LogAdapter};
use crate::entry::LogEntry;
use crate::error::AdapterError;

/// Keeps delivered entries in memory for inspection.
pub struct MemoryAdapter<C> {
    entries: Mutex<Vec<LogEntry<C>>>,
    options: AdapterOptions<C>,
    disposed: AtomicBool,
}

impl<C> MemoryAdapter<C> {
    pub fn new() -> Self {
        Self::with_options(AdapterOptions::default())
    }

    pub fn with_options(options: AdapterOptions<C>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            options,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<C: Clone> MemoryAdapter<C> {
    /// Snapshot of every entry written so far, in arrival order.
    pub fn entries(&self) -> Vec<LogEntry<C>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<C> Default for MemoryAdapter<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C> LogAdapter<C> for MemoryAdapter<C>
where
    C: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, entry: &LogEntry<C>) -> Result<(), AdapterError> {
        if self.is_disposed() {
            return Err(AdapterError::Disposed(self.name().to_string()));
        }
        if !self.options.is_enabled(entry) {
            return Ok(());
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }
}
