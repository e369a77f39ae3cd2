//! Application lifecycle: ordered startup, graceful drain, logger disposal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use causeway_actions::{
    ActionExecutor, ActionGroup, ActionManager, ActionRecorder, ActionSpec, ActionType,
    CancelSignal, JsonlRecorder, NoopRecorder, OperationGroup, OperationSpec, OperationType,
    TransactionManager,
};
use causeway_logging::{
    AdapterOptions, ConsoleAdapter, Event, FileAdapter, JsonFormatter, JsonlConfig, LogEntry,
    LogEntryContext, Logger, LoggerConfig, LoggerFactory, LoggingError, events,
};
use futures::FutureExt;

use crate::config::Config;
use crate::jobs::HeartbeatJob;
use crate::resources::ResourceStack;
use crate::session::{self, SessionId, SessionMetadata};
use crate::shutdown::Shutdowner;

/// A started application.
///
/// Everything acquired during [`App::start`] sits on a resource stack and
/// is released in reverse order by [`App::stop`], except the logger
/// factory, which is disposed last.
pub struct App {
    session_id: SessionId,
    session_dir: PathBuf,
    config: Config,
    shutdowner: Shutdowner,
    logger_factory: Arc<LoggerFactory<LogEntryContext>>,
    logger: Logger<LogEntryContext>,
    transactions: Arc<TransactionManager>,
    executor: ActionExecutor,
    resources: ResourceStack,
}

/// Handler for failed domain log calls. Falls back to `tracing`.
fn logging_error_handler(
    formatter: JsonFormatter,
    shutdowner: Option<Shutdowner>,
) -> impl Fn(Option<&LogEntry<LogEntryContext>>, &LoggingError) + Send + Sync + 'static {
    move |entry, err| {
        let entry = entry
            .and_then(|entry| formatter.format(entry).ok())
            .unwrap_or_default();
        tracing::error!(error = %err, entry = %entry, "Failed to write log entry");
        if let Some(shutdowner) = &shutdowner {
            shutdowner.request_stop();
        }
    }
}

fn build_logger_factory(
    config: &Config,
    session_id: SessionId,
    session_dir: &Path,
    shutdowner: &Shutdowner,
) -> Result<LoggerFactory<LogEntryContext>> {
    let formatter = JsonFormatter::new(config.app.to_app_info(), session_id.as_u64());
    let logging = &config.logging;

    let mut builder = LoggerConfig::<LogEntryContext>::builder()
        .levels(logging.min_level, logging.max_level)
        .error_handler(logging_error_handler(
            formatter.clone(),
            logging.stop_app_on_error.then(|| shutdowner.clone()),
        ));

    if logging.console.enabled {
        builder = builder.add_adapter(ConsoleAdapter::new(
            formatter.clone(),
            logging.console.format,
            AdapterOptions::new(logging.console.min_level, logging.console.max_level),
        ));
    }

    if logging.file.enabled {
        let path = Config::resolve_path(&logging.file.path, session_dir);
        let jsonl = if logging.file.session_mode {
            JsonlConfig::session(path)
        } else {
            JsonlConfig::daily_rotation(path)
        };
        let adapter = FileAdapter::new(
            jsonl,
            formatter,
            AdapterOptions::new(logging.file.min_level, logging.file.max_level),
        )
        .context("Failed to open log file")?;
        builder = builder.add_adapter(adapter);
    }

    LoggerFactory::new(session_id.as_u64(), builder.build())
        .context("Failed to create logger factory")
}

impl App {
    /// Start the application in a fresh session under `causeway_dir`.
    pub async fn start(config: Config, causeway_dir: &Path, shutdowner: Shutdowner) -> Result<Self> {
        let session_id = SessionId::generate();
        let session_dir = session::session_dir(causeway_dir, &session_id);
        std::fs::create_dir_all(&session_dir).with_context(|| {
            format!("Failed to create session directory {}", session_dir.display())
        })?;

        let logger_factory = Arc::new(build_logger_factory(
            &config,
            session_id,
            &session_dir,
            &shutdowner,
        )?);

        let mut resources = ResourceStack::new();
        let acquired = Self::acquire(
            &config,
            session_id,
            &session_dir,
            &shutdowner,
            &logger_factory,
            &mut resources,
        )
        .await;

        match acquired {
            Ok((logger, transactions, executor)) => {
                let app = Self {
                    session_id,
                    session_dir,
                    config,
                    shutdowner,
                    logger_factory,
                    logger,
                    transactions,
                    executor,
                    resources,
                };
                app.log_application_event(events::APPLICATION_STARTED, "application started")
                    .await;
                tracing::info!("Session: {} -> {}", app.session_id, app.session_dir.display());
                Ok(app)
            }
            Err(e) => {
                tracing::error!("Application failed to start: {:#}", e);
                let failed = resources.unwind().await;
                if !failed.is_empty() {
                    tracing::warn!("Resources not released cleanly: {:?}", failed);
                }
                if let Err(dispose) = logger_factory.dispose() {
                    tracing::error!("Failed to dispose logger factory: {}", dispose);
                }
                Err(e)
            }
        }
    }

    async fn acquire(
        config: &Config,
        session_id: SessionId,
        session_dir: &Path,
        shutdowner: &Shutdowner,
        logger_factory: &Arc<LoggerFactory<LogEntryContext>>,
        resources: &mut ResourceStack,
    ) -> Result<(Logger<LogEntryContext>, Arc<TransactionManager>, ActionExecutor)> {
        let logger = logger_factory.create_logger("app.Application")?;
        logger
            .info_with_event(
                LogEntryContext::for_session(session_id.as_u64()),
                events::APPLICATION_IS_STARTING,
                "application is starting",
                Vec::new(),
            )
            .await?;

        let mut metadata =
            SessionMetadata::new(session_id, &config.app.name, &config.app.version);
        if config.logging.file.enabled {
            metadata = metadata
                .with_log_path(Config::resolve_path(&config.logging.file.path, session_dir));
        }

        let recorder: Arc<dyn ActionRecorder> = if config.actions.records_enabled {
            let path = Config::resolve_path(&config.actions.records_path, session_dir);
            metadata = metadata.with_records_path(&path);
            Arc::new(
                JsonlRecorder::new(JsonlConfig::session(path))
                    .context("Failed to open action records")?,
            )
        } else {
            Arc::new(NoopRecorder)
        };
        {
            let recorder = Arc::clone(&recorder);
            resources.push("action recorder", move || {
                async move { recorder.dispose().map_err(Into::into) }.boxed()
            });
        }
        session::write_metadata(session_dir, &metadata)?;

        let transactions = Arc::new(TransactionManager::new(
            session_id.as_u64(),
            logger_factory,
            Arc::clone(&recorder),
        )?);
        {
            let transactions = Arc::clone(&transactions);
            resources.push("transaction manager", move || {
                async move {
                    transactions.allow_to_create(false);
                    transactions.wait().await;
                    Ok(())
                }
                .boxed()
            });
        }

        let actions = Arc::new(ActionManager::new(
            session_id.as_u64(),
            logger_factory,
            recorder,
        )?);
        {
            let actions = Arc::clone(&actions);
            resources.push("action manager", move || {
                async move {
                    actions.allow_to_create(false);
                    actions.wait().await;
                    Ok(())
                }
                .boxed()
            });
        }

        let executor = ActionExecutor::new(actions, logger_factory.create_logger("app.Executor")?)
            .with_stop_handle(
                Arc::new(shutdowner.clone()),
                config.actions.stop_app_on_error,
            );

        // the start itself is tracked like any other unit of work
        let transaction = transactions.create_and_start().await?;
        executor
            .exec_with_operation(
                CancelSignal::new(),
                &transaction,
                ActionSpec::new(ActionType::APPLICATION_START).with_group(ActionGroup::APPLICATION),
                OperationSpec::new(OperationType::APPLICATION_START)
                    .with_group(OperationGroup::APPLICATION)
                    .with_param("session_id", session_id.as_u64())
                    .with_param("app", &config.app.name),
                |_ctx| async { Ok::<_, anyhow::Error>(()) },
            )
            .await?;

        if config.jobs.heartbeat_enabled {
            let job = HeartbeatJob::new(
                Arc::clone(&transactions),
                executor.clone(),
                logger_factory.create_logger("app.Heartbeat")?,
                Duration::from_secs(config.jobs.heartbeat_interval_secs),
            )
            .spawn();
            resources.push("heartbeat job", move || job.stop().boxed());
        }

        Ok((logger, transactions, executor))
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    async fn log_application_event(&self, event: Event, message: &str) {
        // failures already went through the error handler
        let _ = self
            .logger
            .info_with_event(
                LogEntryContext::for_session(self.session_id.as_u64()),
                event,
                message,
                Vec::new(),
            )
            .await;
    }

    /// Stop the application: drain work, release resources, dispose logging.
    pub async fn stop(mut self) -> Result<()> {
        if let Err(e) = self.run_stop_action().await {
            tracing::warn!("Stop action failed: {:#}", e);
        }

        tracing::debug!(
            "Stopping {} (stop requested: {}), releasing {} resources",
            self.config.app.name,
            self.shutdowner.is_stop_requested(),
            self.resources.len()
        );

        let failed = self.resources.unwind().await;

        self.log_application_event(events::APPLICATION_STOPPED, "application stopped")
            .await;
        self.logger_factory
            .dispose()
            .context("Failed to dispose logger factory")?;

        if failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Failed to release: {}", failed.join(", "))
        }
    }

    async fn run_stop_action(&self) -> Result<()> {
        let transaction = self.transactions.create_and_start().await?;
        let logger = self.logger.clone();
        self.executor
            .exec_with_operation(
                CancelSignal::new(),
                &transaction,
                ActionSpec::new(ActionType::APPLICATION_STOP).with_group(ActionGroup::APPLICATION),
                OperationSpec::new(OperationType::APPLICATION_CONTROLLER_STOP)
                    .with_group(OperationGroup::APPLICATION),
                |ctx| async move {
                    logger
                        .info_with_event(
                            ctx.log_context(),
                            events::APPLICATION_IS_STOPPING,
                            "application is stopping",
                            Vec::new(),
                        )
                        .await?;
                    Ok::<_, anyhow::Error>(())
                },
            )
            .await
    }

    /// Start, wait for a stop request, then stop.
    pub async fn run(config: Config, causeway_dir: &Path, shutdowner: Shutdowner) -> Result<()> {
        let app = Self::start(config, causeway_dir, shutdowner.clone()).await?;
        shutdowner.stopped().await;
        app.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_actions::Record;
    use tempfile::tempdir;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.logging.console.enabled = false;
        config.jobs.heartbeat_enabled = false;
        config
    }

    #[tokio::test]
    async fn test_start_and_stop_writes_logs_and_records() {
        let dir = tempdir().unwrap();
        let app = App::start(quiet_config(), dir.path(), Shutdowner::new())
            .await
            .unwrap();
        let session_dir = app.session_dir().to_path_buf();

        let metadata = session::read_metadata(&session_dir).unwrap();
        assert_eq!(metadata.session_id, app.session_id());

        app.stop().await.unwrap();

        let entries: Vec<serde_json::Value> =
            causeway_logging::JsonlWriter::read_lines(&session_dir.join("app.jsonl")).unwrap();
        let names: Vec<&str> = entries
            .iter()
            .filter_map(|e| e["event"]["name"].as_str())
            .collect();
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("ApplicationIsStarting") < position("ApplicationStarted"));
        assert!(position("ApplicationStarted") < position("ApplicationIsStopping"));
        assert_eq!(names.last(), Some(&"ApplicationStopped"));

        let records = JsonlRecorder::read_records(&session_dir.join("actions.jsonl")).unwrap();
        let actions = records
            .iter()
            .filter(|r| matches!(r, Record::Action(_)))
            .count();
        // start and stop actions, each recorded at creation and completion
        assert_eq!(actions, 4);
    }

    #[tokio::test]
    async fn test_start_failure_returns_error() {
        let dir = tempdir().unwrap();
        let mut config = quiet_config();
        // a regular file where the records directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        config.actions.records_path = blocker.join("actions.jsonl");

        let result = App::start(config, dir.path(), Shutdowner::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_returns_after_stop_request() {
        let dir = tempdir().unwrap();
        let shutdowner = Shutdowner::new();
        let run = {
            let shutdowner = shutdowner.clone();
            let path = dir.path().to_path_buf();
            tokio::spawn(async move { App::run(quiet_config(), &path, shutdowner).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdowner.request_stop();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
