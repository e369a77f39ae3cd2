//! The structured logger.
//!
//! A [`Logger`] turns a call into a [`LogEntry`], checks it against the
//! session's level range and filter, then writes it to every adapter at
//! once. Each adapter runs in its own task and the call returns when the
//! slowest one finishes. Failures are collected into one [`LoggingError`]
//! and handed to the session's error handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::future::join_all;

use crate::config::LoggerConfig;
use crate::entry::{Field, LogEntry};
use crate::entry_error::EntryError;
use crate::error::{AdapterError, AdapterFailure, LoggingError};
use crate::event::Event;
use crate::id::IdGenerator;
use crate::level::LogLevel;

/// State shared by every logger minted from one provider.
pub(crate) struct Shared<C> {
    pub(crate) id_generator: Arc<IdGenerator>,
    pub(crate) config: LoggerConfig<C>,
    pub(crate) disposed: AtomicBool,
}

/// A named logger bound to a logging session.
///
/// Cloning is cheap; clones share the disposed flag.
pub struct Logger<C> {
    category: Arc<str>,
    shared: Arc<Shared<C>>,
    disposed: Arc<AtomicBool>,
}

impl<C> Clone for Logger<C> {
    fn clone(&self) -> Self {
        Self {
            category: Arc::clone(&self.category),
            shared: Arc::clone(&self.shared),
            disposed: Arc::clone(&self.disposed),
        }
    }
}

impl<C> std::fmt::Debug for Logger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("category", &self.category)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

macro_rules! level_methods {
    ($level:expr, $name:literal, $plain:ident, $with_event:ident, $with_error:ident, $with_event_and_error:ident) => {
        #[doc = concat!("Log a message at ", $name, " level.")]
        pub async fn $plain(
            &self,
            ctx: C,
            message: impl Into<String>,
            fields: Vec<Field>,
        ) -> Result<(), LoggingError> {
            self.log(ctx, $level, None, None, message.into(), fields).await
        }

        #[doc = concat!("Log a classified event at ", $name, " level.")]
        pub async fn $with_event(
            &self,
            ctx: C,
            event: Event,
            message: impl Into<String>,
            fields: Vec<Field>,
        ) -> Result<(), LoggingError> {
            self.log(ctx, $level, Some(event), None, message.into(), fields)
                .await
        }

        #[doc = concat!("Log an error at ", $name, " level.")]
        pub async fn $with_error(
            &self,
            ctx: C,
            error: impl Into<EntryError>,
            message: impl Into<String>,
            fields: Vec<Field>,
        ) -> Result<(), LoggingError> {
            self.log(ctx, $level, None, Some(error.into()), message.into(), fields)
                .await
        }

        #[doc = concat!("Log a classified event with an error at ", $name, " level.")]
        pub async fn $with_event_and_error(
            &self,
            ctx: C,
            event: Event,
            error: impl Into<EntryError>,
            message: impl Into<String>,
            fields: Vec<Field>,
        ) -> Result<(), LoggingError> {
            self.log(
                ctx,
                $level,
                Some(event),
                Some(error.into()),
                message.into(),
                fields,
            )
            .await
        }
    };
}

impl<C> Logger<C> {
    pub(crate) fn new(category: &str, shared: Arc<Shared<C>>) -> Self {
        Self {
            category: Arc::from(category),
            shared,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// True once this logger or its provider has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.shared.disposed.load(Ordering::Acquire)
    }

    /// Stop this logger. Adapters are owned by the provider and stay open.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Whether an entry at `level` could reach the adapters.
    pub fn is_level_enabled(&self, level: LogLevel) -> bool {
        let options = self.shared.config.options;
        options.is_enabled() && options.contains(level)
    }

    fn is_enabled(&self, entry: &LogEntry<C>) -> bool {
        self.is_level_enabled(entry.level)
            && self
                .shared
                .config
                .filter
                .as_ref()
                .is_none_or(|f| f.is_enabled(entry))
    }

    fn report(&self, entry: Option<&LogEntry<C>>, err: &LoggingError) {
        if let Some(handler) = &self.shared.config.error_handler {
            handler(entry, err);
        }
    }
}

impl<C> Logger<C>
where
    C: Send + Sync + 'static,
{
    /// Build an entry and deliver it to every adapter.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn log(
        &self,
        ctx: C,
        level: LogLevel,
        event: Option<Event>,
        error: Option<EntryError>,
        message: String,
        fields: Vec<Field>,
    ) -> Result<(), LoggingError> {
        if self.is_disposed() {
            let err = LoggingError::disposed(&self.category);
            self.report(None, &err);
            return Err(err);
        }

        let id = match self.shared.id_generator.next_id() {
            Ok(id) => id,
            Err(e) => {
                let err = LoggingError::id_generation(e);
                self.report(None, &err);
                return Err(err);
            }
        };

        let entry = LogEntry {
            id,
            timestamp: Utc::now(),
            context: ctx,
            level,
            category: self.category.to_string(),
            event: event.unwrap_or(Event::UNKNOWN),
            error,
            message,
            fields,
        };

        if !self.is_enabled(&entry) {
            return Ok(());
        }

        let entry = Arc::new(entry);
        let adapters = &self.shared.config.adapters;
        let writes = adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            let entry = Arc::clone(&entry);
            tokio::spawn(async move { adapter.write(&entry).await })
        });
        let results = join_all(writes).await;

        let failures: Vec<AdapterFailure> = adapters
            .iter()
            .zip(results)
            .filter_map(|(adapter, result)| {
                let error = match result {
                    Ok(Ok(())) => return None,
                    Ok(Err(e)) => e,
                    Err(join_err) => AdapterError::Task(join_err.to_string()),
                };
                Some(AdapterFailure {
                    adapter: adapter.name().to_string(),
                    error,
                })
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        let err = LoggingError::adapters(failures);
        self.report(Some(&entry), &err);
        Err(err)
    }

    level_methods!(LogLevel::Trace, "trace", trace, trace_with_event, trace_with_error, trace_with_event_and_error);
    level_methods!(LogLevel::Debug, "debug", debug, debug_with_event, debug_with_error, debug_with_event_and_error);
    level_methods!(LogLevel::Info, "info", info, info_with_event, info_with_error, info_with_event_and_error);
    level_methods!(LogLevel::Warning, "warning", warning, warning_with_event, warning_with_error, warning_with_event_and_error);
    level_methods!(LogLevel::Error, "error", error, error_with_event, error_with_error, error_with_event_and_error);
    level_methods!(LogLevel::Fatal, "fatal", fatal, fatal_with_event, fatal_with_error, fatal_with_event_and_error);
}
