//! Logger provider and factory.
//!
//! A provider owns one identifier generator and one configuration and mints
//! named loggers that share both. The factory is the session-level owner:
//! it creates the generator itself and takes ownership of the adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::LoggerConfig;
use crate::error::{AdapterFailure, FactoryError};
use crate::id::{IdGenerator, default_concurrency_level};
use crate::logger::{Logger, Shared};

/// Mints loggers over a shared generator and configuration.
pub struct LoggerProvider<C> {
    shared: Arc<Shared<C>>,
    dispose_adapters: bool,
}

impl<C> LoggerProvider<C> {
    /// Create a provider. When `dispose_adapters` is set, disposing the
    /// provider also disposes every configured adapter.
    pub fn new(
        id_generator: Arc<IdGenerator>,
        config: LoggerConfig<C>,
        dispose_adapters: bool,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id_generator,
                config,
                disposed: AtomicBool::new(false),
            }),
            dispose_adapters,
        }
    }

    pub fn create_logger(&self, category: &str) -> Result<Logger<C>, FactoryError> {
        if self.is_disposed() {
            return Err(FactoryError::Disposed("logger provider"));
        }
        Ok(Logger::new(category, Arc::clone(&self.shared)))
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    pub fn id_generator(&self) -> &Arc<IdGenerator> {
        &self.shared.id_generator
    }

    /// Mark the provider disposed. Only the first call does any work.
    pub fn dispose(&self) -> Result<(), FactoryError> {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if !self.dispose_adapters {
            return Ok(());
        }

        let failures: Vec<AdapterFailure> = self
            .shared
            .config
            .adapters
            .iter()
            .filter_map(|adapter| {
                adapter.dispose().err().map(|error| AdapterFailure {
                    adapter: adapter.name().to_string(),
                    error,
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::Dispose(failures))
        }
    }
}

/// Session-level owner of loggers and adapters.
pub struct LoggerFactory<C> {
    provider: LoggerProvider<C>,
}

impl<C> LoggerFactory<C> {
    /// Create a factory whose identifiers carry `logging_session_id` in
    /// their high half.
    pub fn new(logging_session_id: u64, config: LoggerConfig<C>) -> Result<Self, FactoryError> {
        Self::with_concurrency_level(logging_session_id, config, default_concurrency_level())
    }

    pub fn with_concurrency_level(
        logging_session_id: u64,
        config: LoggerConfig<C>,
        concurrency_level: u32,
    ) -> Result<Self, FactoryError> {
        let generator = IdGenerator::new(logging_session_id, concurrency_level)?;
        Ok(Self {
            provider: LoggerProvider::new(Arc::new(generator), config, true),
        })
    }

    pub fn create_logger(&self, category: &str) -> Result<Logger<C>, FactoryError> {
        if self.provider.is_disposed() {
            return Err(FactoryError::Disposed("logger factory"));
        }
        self.provider.create_logger(category)
    }

    pub fn logging_session_id(&self) -> u64 {
        self.provider.id_generator().session_id()
    }

    pub fn is_disposed(&self) -> bool {
        self.provider.is_disposed()
    }

    /// Dispose every adapter exactly once; later calls are no-ops.
    pub fn dispose(&self) -> Result<(), FactoryError> {
        self.provider.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LogAdapter;
    use crate::entry::LogEntry;
    use crate::error::{AdapterError, LoggingErrorKind};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingAdapter {
        disposals: AtomicUsize,
    }

    #[async_trait]
    impl LogAdapter<()> for CountingAdapter {
        fn name(&self) -> &str {
            "counting"
        }

        async fn write(&self, _entry: &LogEntry<()>) -> Result<(), AdapterError> {
            Ok(())
        }

        fn dispose(&self) -> Result<(), AdapterError> {
            self.disposals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = LoggerConfig::<()>::builder().build();
        let result = LoggerFactory::with_concurrency_level(1, config, 0);
        assert!(matches!(result, Err(FactoryError::IdGenerator(_))));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let adapter = Arc::new(CountingAdapter::default());
        let config = LoggerConfig::builder()
            .add_shared_adapter(adapter.clone())
            .build();
        let factory = LoggerFactory::new(3, config).unwrap();

        factory.dispose().unwrap();
        factory.dispose().unwrap();
        factory.dispose().unwrap();

        assert!(factory.is_disposed());
        assert_eq!(adapter.disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_after_dispose_fails() {
        let factory = LoggerFactory::new(3, LoggerConfig::<()>::builder().build()).unwrap();
        factory.dispose().unwrap();

        let err = factory.create_logger("late").unwrap_err();
        assert!(matches!(err, FactoryError::Disposed("logger factory")));
    }

    #[test]
    fn test_provider_without_adapter_ownership() {
        let adapter = Arc::new(CountingAdapter::default());
        let config = LoggerConfig::builder()
            .add_shared_adapter(adapter.clone())
            .build();
        let provider = LoggerProvider::new(Arc::new(IdGenerator::new(1, 1).unwrap()), config, false);

        provider.dispose().unwrap();

        assert!(provider.is_disposed());
        assert_eq!(adapter.disposals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_loggers_fail_after_dispose() {
        let factory = LoggerFactory::new(3, LoggerConfig::<()>::builder().build()).unwrap();
        let logger = factory.create_logger("early").unwrap();
        factory.dispose().unwrap();

        let err = logger.info((), "after dispose", Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), LoggingErrorKind::Disposed);
    }

    #[test]
    fn test_loggers_share_session_prefix() {
        let factory = LoggerFactory::new(77, LoggerConfig::<()>::builder().build()).unwrap();
        assert_eq!(factory.logging_session_id(), 77);
    }
}
