//! Error types for the logging pipeline.

use std::fmt;

use thiserror::Error;

/// Errors raised while minting identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdGeneratorError {
    #[error("concurrency level must be at least 1, got {0}")]
    InvalidConcurrencyLevel(u32),

    #[error("{sequence} {index} has exhausted its range")]
    Exhausted { sequence: &'static str, index: usize },
}

/// Errors returned by a single adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter '{0}' has been disposed")]
    Disposed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel closed")]
    ChannelClosed,

    #[error("adapter task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

/// One adapter's failure within a fan-out.
#[derive(Debug)]
pub struct AdapterFailure {
    pub adapter: String,
    pub error: AdapterError,
}

impl fmt::Display for AdapterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.adapter, self.error)
    }
}

/// What made a log call fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// The logger (or the provider behind it) has been disposed.
    Disposed,
    /// The entry identifier could not be minted.
    IdGeneration,
    /// One or more adapters failed to write the entry.
    AdapterWrite,
}

/// Aggregate failure of a single log call.
///
/// Displays as `message; errors: ["adapter: cause", ...]`.
#[derive(Debug)]
pub struct LoggingError {
    kind: LoggingErrorKind,
    message: String,
    id_error: Option<IdGeneratorError>,
    failures: Vec<AdapterFailure>,
}

impl LoggingError {
    pub(crate) fn disposed(category: &str) -> Self {
        Self {
            kind: LoggingErrorKind::Disposed,
            message: format!("logger '{category}' has been disposed"),
            id_error: None,
            failures: Vec::new(),
        }
    }

    pub(crate) fn id_generation(error: IdGeneratorError) -> Self {
        Self {
            kind: LoggingErrorKind::IdGeneration,
            message: "failed to generate a log entry id".to_string(),
            id_error: Some(error),
            failures: Vec::new(),
        }
    }

    pub(crate) fn adapters(failures: Vec<AdapterFailure>) -> Self {
        Self {
            kind: LoggingErrorKind::AdapterWrite,
            message: "failed to write a log entry".to_string(),
            id_error: None,
            failures,
        }
    }

    pub fn kind(&self) -> LoggingErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn failures(&self) -> &[AdapterFailure] {
        &self.failures
    }

    /// Names of the adapters that failed, in configuration order.
    pub fn failed_adapters(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.adapter.as_str()).collect()
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        let causes: Vec<String> = match &self.id_error {
            Some(err) => vec![err.to_string()],
            None => self.failures.iter().map(|f| f.to_string()).collect(),
        };
        if causes.is_empty() {
            return Ok(());
        }

        f.write_str("; errors: [")?;
        for (i, cause) in causes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cause:?}")?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(err) = &self.id_error {
            return Some(err);
        }
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

/// Errors from the logger factory and provider.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    #[error("failed to create id generator: {0}")]
    IdGenerator(#[from] IdGeneratorError),

    #[error("failed to dispose adapters: {}", join_failures(.0))]
    Dispose(Vec<AdapterFailure>),
}

fn join_failures(failures: &[AdapterFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_failures() {
        let err = LoggingError::adapters(vec![
            AdapterFailure {
                adapter: "file".to_string(),
                error: AdapterError::Other("disk full".to_string()),
            },
            AdapterFailure {
                adapter: "queue".to_string(),
                error: AdapterError::ChannelClosed,
            },
        ]);

        assert_eq!(
            err.to_string(),
            r#"failed to write a log entry; errors: ["file: disk full", "queue: channel closed"]"#
        );
        assert_eq!(err.failed_adapters(), vec!["file", "queue"]);
        assert_eq!(err.kind(), LoggingErrorKind::AdapterWrite);
    }

    #[test]
    fn test_display_disposed_has_no_error_list() {
        let err = LoggingError::disposed("actions.ActionManager");
        assert_eq!(
            err.to_string(),
            "logger 'actions.ActionManager' has been disposed"
        );
    }

    #[test]
    fn test_id_generation_source() {
        let err = LoggingError::id_generation(IdGeneratorError::Exhausted {
            sequence: "counter",
            index: 3,
        });
        assert!(err.to_string().contains("counter 3 has exhausted its range"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
