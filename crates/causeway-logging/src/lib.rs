//! Structured, multi-destination asynchronous logging.
//!
//! This crate provides the logging substrate every causeway service writes
//! through:
//!
//! - **Identifiers**: [`IdGenerator`] mints session-prefixed 128-bit ids from striped atomic counters
//! - **Entries**: [`LogEntry`] values generic over a correlation context, classified by [`Event`] and [`EntryError`]
//! - **Loggers**: [`LoggerFactory`] / [`LoggerProvider`] mint named [`Logger`]s that fan each entry out to every adapter concurrently
//! - **Adapters**: console, JSONL file, bounded queue and in-memory destinations
//!
//! # Usage
//!
//! ```rust,no_run
//! use causeway_logging::{
//!     events, AdapterOptions, AppInfo, ConsoleAdapter, ConsoleFormat, Field, JsonFormatter,
//!     LogEntryContext, LoggerConfig, LoggerFactory,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let session_id = 42;
//!     let formatter = JsonFormatter::new(AppInfo::default(), session_id);
//!     let config = LoggerConfig::<LogEntryContext>::builder()
//!         .add_adapter(ConsoleAdapter::new(formatter, ConsoleFormat::Text, AdapterOptions::default()))
//!         .error_handler(|_entry, err| eprintln!("logging failed: {err}"))
//!         .build();
//!
//!     let factory = LoggerFactory::new(session_id, config).unwrap();
//!     let logger = factory.create_logger("app.Main").unwrap();
//!
//!     logger
//!         .info_with_event(
//!             LogEntryContext::for_session(session_id),
//!             events::APPLICATION_STARTED,
//!             "application started",
//!             vec![Field::new("port", 8080)],
//!         )
//!         .await
//!         .unwrap();
//!
//!     factory.dispose().unwrap();
//! }
//! ```

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod context;
pub mod entry;
pub mod entry_error;
pub mod error;
pub mod event;
pub mod factory;
pub mod formatting;
pub mod id;
pub mod jsonl;
pub mod level;
pub mod logger;

// Re-export main types
pub use adapter::{AdapterOptions, LogAdapter, LoggingFilter};
pub use adapters::{ChannelAdapter, ConsoleAdapter, ConsoleFormat, FileAdapter, MemoryAdapter};
pub use config::{ErrorHandler, LoggerConfig, LoggerConfigBuilder, LoggerOptions};
pub use context::{ActionInfo, LogEntryContext, OperationInfo, TransactionInfo};
pub use entry::{Field, LogEntry};
pub use entry_error::{ApiError, DbError, EntryError, ErrorCategory, ErrorCode, PlatformError};
pub use error::{
    AdapterError, AdapterFailure, FactoryError, IdGeneratorError, LoggingError, LoggingErrorKind,
};
pub use event::{Event, EventCategory, EventGroup, events};
pub use factory::{LoggerFactory, LoggerProvider};
pub use formatting::{AgentInfo, AppInfo, JsonFormatter, format_text};
pub use id::{IdGenerator, default_concurrency_level};
pub use jsonl::{JsonlConfig, JsonlWriter, WriteError};
pub use level::{LogLevel, ParseLevelError};
pub use logger::Logger;
