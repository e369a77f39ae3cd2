//! Errors attached to log entries.
//!
//! Adapters never see concrete error types. Every error carried by a
//! [`LogEntry`](crate::LogEntry) is converted up front into [`EntryError`],
//! a closed set of categories that formatters dispatch on by tag.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use serde::Serialize;

/// Numeric error code shared across services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u64);

impl ErrorCode {
    pub const NO_ERROR: ErrorCode = ErrorCode(0);
    pub const UNKNOWN: ErrorCode = ErrorCode(1);
    pub const INTERNAL: ErrorCode = ErrorCode(2);

    pub const APPLICATION: ErrorCode = ErrorCode(1000);
    pub const APPLICATION_START: ErrorCode = ErrorCode(1001);
    pub const APPLICATION_STOP: ErrorCode = ErrorCode(1002);

    pub const IDENTITY: ErrorCode = ErrorCode(1200);
    pub const TRANSACTION: ErrorCode = ErrorCode(1400);
    pub const ACTION: ErrorCode = ErrorCode(1500);
    pub const OPERATION: ErrorCode = ErrorCode(1600);

    pub const INVALID_OPERATION: ErrorCode = ErrorCode(10000);
    pub const INVALID_DATA: ErrorCode = ErrorCode(10001);
    pub const NOT_FOUND: ErrorCode = ErrorCode(10002);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category tag formatters switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Internal,
    Api,
    Database,
    Unknown,
}

/// Internal framework error, optionally with a captured backtrace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct PlatformError {
    pub code: ErrorCode,
    pub message: String,
    pub backtrace: Option<String>,
}

impl PlatformError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            backtrace: None,
        }
    }

    /// Capture the current backtrace if the runtime has backtraces enabled.
    pub fn with_backtrace(code: ErrorCode, message: impl Into<String>) -> Self {
        let captured = Backtrace::capture();
        let backtrace = match captured.status() {
            BacktraceStatus::Captured => Some(captured.to_string()),
            _ => None,
        };
        Self {
            code,
            message: message.into(),
            backtrace,
        }
    }
}

/// Error produced at an API boundary (request validation, authorization).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error reported by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct DbError {
    pub code: ErrorCode,
    pub message: String,
}

impl DbError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error attached to a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    Internal(PlatformError),
    Api(ApiError),
    Database(DbError),
    /// Any foreign error, captured by type name and message.
    Unknown { type_name: String, message: String },
}

impl EntryError {
    /// Classify a foreign error as [`EntryError::Unknown`].
    pub fn foreign<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        EntryError::Unknown {
            type_name: std::any::type_name::<E>().to_string(),
            message,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EntryError::Internal(_) => ErrorCategory::Internal,
            EntryError::Api(_) => ErrorCategory::Api,
            EntryError::Database(_) => ErrorCategory::Database,
            EntryError::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EntryError::Internal(e) => e.code,
            EntryError::Api(e) => e.code,
            EntryError::Database(e) => e.code,
            EntryError::Unknown { .. } => ErrorCode::UNKNOWN,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            EntryError::Internal(e) => &e.message,
            EntryError::Api(e) => &e.message,
            EntryError::Database(e) => &e.message,
            EntryError::Unknown { message, .. } => message,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            EntryError::Unknown { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    pub fn backtrace(&self) -> Option<&str> {
        match self {
            EntryError::Internal(e) => e.backtrace.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::Internal(e) => write!(f, "internal error: {e}"),
            EntryError::Api(e) => write!(f, "api error: {e}"),
            EntryError::Database(e) => write!(f, "database error: {e}"),
            EntryError::Unknown { type_name, message } => write!(f, "{type_name}: {message}"),
        }
    }
}

impl From<PlatformError> for EntryError {
    fn from(err: PlatformError) -> Self {
        EntryError::Internal(err)
    }
}

impl From<ApiError> for EntryError {
    fn from(err: ApiError) -> Self {
        EntryError::Api(err)
    }
}

impl From<DbError> for EntryError {
    fn from(err: DbError) -> Self {
        EntryError::Database(err)
    }
}

impl From<&crate::LoggingError> for EntryError {
    fn from(err: &crate::LoggingError) -> Self {
        EntryError::Internal(PlatformError::new(ErrorCode::INTERNAL, err.to_string()))
    }
}
