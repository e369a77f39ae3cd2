//! Logger configuration shared by every logger of a session.

use std::sync::Arc;

use crate::adapter::{LogAdapter, LoggingFilter};
use crate::entry::LogEntry;
use crate::error::LoggingError;
use crate::level::LogLevel;

/// Callback invoked exactly once per failed log call.
///
/// The entry is `None` when the call failed before an entry existed
/// (disposed logger, identifier failure).
pub type ErrorHandler<C> = Arc<dyn Fn(Option<&LogEntry<C>>, &LoggingError) + Send + Sync>;

/// Level range applied by the logger before fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerOptions {
    pub min_level: LogLevel,
    pub max_level: LogLevel,
}

impl LoggerOptions {
    pub fn new(min_level: LogLevel, max_level: LogLevel) -> Self {
        Self {
            min_level,
            max_level,
        }
    }

    /// A logger is enabled only when its range is valid and non-empty.
    pub fn is_enabled(&self) -> bool {
        LogLevel::is_valid_range(self.min_level, self.max_level)
    }

    pub fn contains(&self, level: LogLevel) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self::new(LogLevel::Trace, LogLevel::Fatal)
    }
}

/// Adapters, level range, filter and error handler for a logging session.
pub struct LoggerConfig<C> {
    pub(crate) adapters: Vec<Arc<dyn LogAdapter<C>>>,
    pub(crate) options: LoggerOptions,
    pub(crate) filter: Option<Arc<dyn LoggingFilter<C>>>,
    pub(crate) error_handler: Option<ErrorHandler<C>>,
}

impl<C> LoggerConfig<C> {
    pub fn builder() -> LoggerConfigBuilder<C> {
        LoggerConfigBuilder::new()
    }

    pub fn options(&self) -> LoggerOptions {
        self.options
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

/// Builder for [`LoggerConfig`].
pub struct LoggerConfigBuilder<C> {
    config: LoggerConfig<C>,
}

impl<C> LoggerConfigBuilder<C> {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig {
                adapters: Vec::new(),
                options: LoggerOptions::default(),
                filter: None,
                error_handler: None,
            },
        }
    }

    pub fn add_adapter(self, adapter: impl LogAdapter<C> + 'static) -> Self {
        self.add_shared_adapter(Arc::new(adapter))
    }

    /// Add an adapter the caller keeps a handle to (e.g. for inspection).
    pub fn add_shared_adapter(mut self, adapter: Arc<dyn LogAdapter<C>>) -> Self {
        self.config.adapters.push(adapter);
        self
    }

    pub fn options(mut self, options: LoggerOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn levels(self, min_level: LogLevel, max_level: LogLevel) -> Self {
        self.options(LoggerOptions::new(min_level, max_level))
    }

    pub fn filter(mut self, filter: impl LoggingFilter<C> + 'static) -> Self {
        self.config.filter = Some(Arc::new(filter));
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Option<&LogEntry<C>>, &LoggingError) + Send + Sync + 'static,
    {
        self.config.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> LoggerConfig<C> {
        self.config
    }
}

impl<C> Default for LoggerConfigBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
