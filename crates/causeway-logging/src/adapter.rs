//! Adapter contract and per-destination filtering.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::LogEntry;
use crate::error::AdapterError;
use crate::level::LogLevel;

/// A pluggable log destination.
///
/// `write` may be called concurrently from many fan-out tasks. `dispose`
/// must be idempotent; writes after disposal return
/// [`AdapterError::Disposed`].
#[async_trait]
pub trait LogAdapter<C>: Send + Sync {
    /// Short name used when reporting failures.
    fn name(&self) -> &str;

    async fn write(&self, entry: &LogEntry<C>) -> Result<(), AdapterError>;

    fn dispose(&self) -> Result<(), AdapterError>;
}

/// Custom predicate deciding whether an entry should be delivered.
pub trait LoggingFilter<C>: Send + Sync {
    fn is_enabled(&self, entry: &LogEntry<C>) -> bool;
}

impl<C, F> LoggingFilter<C> for F
where
    F: Fn(&LogEntry<C>) -> bool + Send + Sync,
{
    fn is_enabled(&self, entry: &LogEntry<C>) -> bool {
        self(entry)
    }
}

/// Level range plus optional filter owned by an adapter.
pub struct AdapterOptions<C> {
    pub min_level: LogLevel,
    pub max_level: LogLevel,
    pub filter: Option<Arc<dyn LoggingFilter<C>>>,
}

impl<C> AdapterOptions<C> {
    pub fn new(min_level: LogLevel, max_level: LogLevel) -> Self {
        Self {
            min_level,
            max_level,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl LoggingFilter<C> + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Whether the adapter should write `entry`.
    pub fn is_enabled(&self, entry: &LogEntry<C>) -> bool {
        LogLevel::is_valid_range(self.min_level, self.max_level)
            && entry.level >= self.min_level
            && entry.level <= self.max_level
            && self.filter.as_ref().is_none_or(|f| f.is_enabled(entry))
    }
}

impl<C> Default for AdapterOptions<C> {
    fn default() -> Self {
        Self::new(LogLevel::Trace, LogLevel::Fatal)
    }
}

impl<C> Clone for AdapterOptions<C> {
    fn clone(&self) -> Self {
        Self {
            min_level: self.min_level,
            max_level: self.max_level,
            filter: self.filter.clone(),
        }
    }
}

impl<C> std::fmt::Debug for AdapterOptions<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("min_level", &self.min_level)
            .field("max_level", &self.max_level)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
