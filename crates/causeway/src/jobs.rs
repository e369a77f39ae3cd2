//! Background jobs run for the lifetime of the application.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use causeway_actions::{
    ActionExecutor, ActionGroup, ActionSpec, ActionType, CancelSignal, OperationGroup,
    OperationSpec, OperationType, TransactionManager,
};
use causeway_logging::{Field, LogEntryContext, Logger};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Handle to a spawned job.
pub struct JobHandle {
    name: &'static str,
    cancel: CancelSignal,
    task: JoinHandle<()>,
}

impl JobHandle {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the job and wait for its current iteration to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("job {} terminated abnormally: {}", self.name, e))
    }
}

/// Periodically runs a session heartbeat action with one operation.
pub struct HeartbeatJob {
    transactions: Arc<TransactionManager>,
    executor: ActionExecutor,
    logger: Logger<LogEntryContext>,
    interval: Duration,
    beats: AtomicU64,
}

impl HeartbeatJob {
    pub fn new(
        transactions: Arc<TransactionManager>,
        executor: ActionExecutor,
        logger: Logger<LogEntryContext>,
        interval: Duration,
    ) -> Self {
        Self {
            transactions,
            executor,
            logger,
            interval,
            beats: AtomicU64::new(0),
        }
    }

    pub fn spawn(self) -> JobHandle {
        let cancel = CancelSignal::new();
        let job = Arc::new(self);
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { job.run(cancel).await })
        };
        JobHandle {
            name: "heartbeat",
            cancel,
            task,
        }
    }

    async fn run(&self, cancel: CancelSignal) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.beat(&cancel).await {
                        tracing::warn!("Heartbeat failed: {:#}", e);
                    }
                }
            }
        }
        tracing::debug!("Heartbeat job stopped");
    }

    /// Run one heartbeat. Returns the beat number.
    pub async fn beat(&self, cancel: &CancelSignal) -> Result<u64> {
        let transaction = self.transactions.create_and_start().await?;
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;

        self.executor
            .exec_with_operation(
                cancel.clone(),
                &transaction,
                ActionSpec::new(ActionType::APPLICATION_SESSION_HEARTBEAT)
                    .with_group(ActionGroup::APPLICATION)
                    .background(),
                OperationSpec::new(OperationType::APPLICATION_SESSION_HEARTBEAT)
                    .with_group(OperationGroup::APPLICATION),
                |ctx| async move {
                    self.logger
                        .debug(ctx.log_context(), "heartbeat", vec![Field::new("beat", beat)])
                        .await?;
                    Ok::<_, anyhow::Error>(beat)
                },
            )
            .await
    }
}
