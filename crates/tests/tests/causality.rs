//! Cross-crate integration tests
//!
//! These tests drive the causality managers through real loggers and
//! recorders, covering full transaction flows and shutdown drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use causeway_actions::{
    ActionCategory, ActionExecutor, ActionGroup, ActionManager, ActionRecorder, ActionSpec,
    ActionType, ActionsError, CancelSignal, EntityKind, JsonlRecorder, NoopRecorder,
    OperationCategory, OperationContext, OperationGroup, OperationParam, OperationSpec,
    OperationType, Record, Status, TransactionManager,
};
use causeway_logging::{
    AdapterError, JsonlConfig, LogAdapter, LogEntry, LogEntryContext, LoggerConfig, LoggerFactory,
    LoggingErrorKind, MemoryAdapter, events,
};

const SESSION: u64 = 0x00AB_CDEF_0123;

struct Harness {
    memory: Arc<MemoryAdapter<LogEntryContext>>,
    factory: LoggerFactory<LogEntryContext>,
    transactions: Arc<TransactionManager>,
    actions: Arc<ActionManager>,
}

impl Harness {
    fn new() -> Self {
        Self::with_recorder(Arc::new(NoopRecorder))
    }

    fn with_recorder(recorder: Arc<dyn ActionRecorder>) -> Self {
        let memory = Arc::new(MemoryAdapter::new());
        let config = LoggerConfig::<LogEntryContext>::builder()
            .add_shared_adapter(memory.clone())
            .build();
        let factory = LoggerFactory::new(SESSION, config).unwrap();
        let transactions =
            Arc::new(TransactionManager::new(SESSION, &factory, Arc::clone(&recorder)).unwrap());
        let actions = Arc::new(ActionManager::new(SESSION, &factory, recorder).unwrap());
        Self {
            memory,
            factory,
            transactions,
            actions,
        }
    }

    fn events(&self) -> Vec<&'static str> {
        self.memory.entries().iter().map(|e| e.event.name).collect()
    }
}

/// Fails every write of one event, succeeds otherwise.
struct FailingAdapter {
    fail_on: &'static str,
}

#[async_trait]
impl LogAdapter<LogEntryContext> for FailingAdapter {
    fn name(&self) -> &str {
        "failing"
    }

    async fn write(&self, entry: &LogEntry<LogEntryContext>) -> Result<(), AdapterError> {
        if entry.event.name == self.fail_on {
            return Err(AdapterError::Other("disk full".to_string()));
        }
        Ok(())
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Delays completion entries before storing them, so a completion is only
/// visible once its log call has returned.
struct SlowCompletionAdapter {
    delay: Duration,
    inner: Arc<MemoryAdapter<LogEntryContext>>,
}

#[async_trait]
impl LogAdapter<LogEntryContext> for SlowCompletionAdapter {
    fn name(&self) -> &str {
        "slow-completion"
    }

    async fn write(&self, entry: &LogEntry<LogEntryContext>) -> Result<(), AdapterError> {
        if entry.event == events::ACTION_COMPLETED || entry.event == events::OPERATION_COMPLETED {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.write(entry).await
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        self.inner.dispose()
    }
}

/// Full flow: one transaction, one action, one operation, then a closed gate.
#[tokio::test]
async fn test_transaction_action_operation_flow() {
    let h = Harness::new();

    let transaction = h.transactions.create_and_start().await.unwrap();
    let action = h
        .actions
        .create_and_start(
            &transaction,
            ActionType::APPLICATION_START,
            ActionCategory::Common,
            ActionGroup::APPLICATION,
            None,
            false,
        )
        .await
        .unwrap();
    let operation = action
        .operations()
        .create_and_start(
            OperationType::APPLICATION_START,
            OperationCategory::Common,
            OperationGroup::APPLICATION,
            None,
            vec![OperationParam::new("id", 1), OperationParam::new("name", "first")],
        )
        .await
        .unwrap();

    assert_eq!(operation.action_id(), action.id());
    assert_eq!(operation.transaction().id(), transaction.id());
    assert_eq!(operation.status(), Status::Running);

    action.operations().complete(&operation, true).await.unwrap();
    h.actions.complete(&action, true).await.unwrap();
    assert_eq!(operation.status(), Status::Succeeded);
    assert_eq!(action.status(), Status::Succeeded);

    // nothing in flight, both drains return at once
    tokio::time::timeout(Duration::from_millis(100), h.actions.wait())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_millis(100), h.transactions.wait())
        .await
        .unwrap();

    h.actions.allow_to_create(false);
    let err = h
        .actions
        .create_and_start(
            &transaction,
            ActionType::APPLICATION_STOP,
            ActionCategory::Common,
            ActionGroup::APPLICATION,
            None,
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ActionsError::NotAllowedToCreate {
            entity: EntityKind::Action,
            ..
        }
    ));

    assert_eq!(
        h.events(),
        vec![
            events::TRANSACTION_CREATED_AND_STARTED.name,
            events::ACTION_CREATED_AND_STARTED.name,
            events::OPERATION_CREATED_AND_STARTED.name,
            events::OPERATION_COMPLETED.name,
            events::ACTION_COMPLETED.name,
        ]
    );

    let entries = h.memory.entries();
    let created = entries
        .iter()
        .find(|e| e.event == events::OPERATION_CREATED_AND_STARTED)
        .unwrap();
    assert_eq!(created.context.app_session_id, Some(SESSION));
    assert_eq!(
        created.context.transaction.map(|t| t.id),
        Some(transaction.id())
    );
    assert_eq!(created.context.action.map(|a| a.id), Some(action.id()));
    assert_eq!(created.context.operation.map(|o| o.id), Some(operation.id()));
}

/// Closing the gate and waiting returns only after every in-flight action
/// has completed, however long each one runs.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_waits_for_concurrent_completions() {
    let h = Harness::new();
    let transaction = h.transactions.create_and_start().await.unwrap();

    let mut actions = Vec::new();
    for _ in 0..16 {
        actions.push(
            h.actions
                .create_and_start(
                    &transaction,
                    ActionType::APPLICATION_SESSION_HEARTBEAT,
                    ActionCategory::Common,
                    ActionGroup::APPLICATION,
                    None,
                    true,
                )
                .await
                .unwrap(),
        );
    }
    assert_eq!(h.actions.num_in_progress(), 16);

    let completed = Arc::new(AtomicUsize::new(0));
    for (i, action) in actions.iter().enumerate() {
        let manager = Arc::clone(&h.actions);
        let action = Arc::clone(action);
        let completed = Arc::clone(&completed);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5 * (i as u64 % 4) + 5)).await;
            manager.complete(&action, i % 3 != 0).await.unwrap();
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    h.actions.allow_to_create(false);
    tokio::time::timeout(Duration::from_secs(5), h.actions.wait())
        .await
        .unwrap();

    assert_eq!(h.actions.num_in_progress(), 0);
    assert!(actions.iter().all(|a| a.status().is_terminal()));
    assert_eq!(
        actions
            .iter()
            .filter(|a| a.status() == Status::Failed)
            .count(),
        6
    );
}

/// Creators racing a gate close: once closed, no creation succeeds, and
/// everything created before the close is drained.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_close_races_with_creators() {
    let h = Harness::new();
    let transaction = h.transactions.create_and_start().await.unwrap();

    let mut creators = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&h.actions);
        let transaction = Arc::clone(&transaction);
        creators.push(tokio::spawn(async move {
            let mut created = 0u64;
            loop {
                match manager
                    .create_and_start(
                        &transaction,
                        ActionType::APPLICATION_START,
                        ActionCategory::Common,
                        ActionGroup::APPLICATION,
                        None,
                        false,
                    )
                    .await
                {
                    Ok(action) => {
                        created += 1;
                        tokio::task::yield_now().await;
                        manager.complete(&action, true).await.unwrap();
                    }
                    Err(ActionsError::NotAllowedToCreate { .. }) => return created,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.actions.allow_to_create(false);

    let mut total = 0;
    for creator in creators {
        total += tokio::time::timeout(Duration::from_secs(5), creator)
            .await
            .unwrap()
            .unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), h.actions.wait())
        .await
        .unwrap();

    assert!(!h.actions.is_allowed_to_create());
    assert_eq!(h.actions.num_created(), total);
    assert_eq!(h.actions.num_in_progress(), 0);
}

/// One failing adapter does not keep the entry from the others, but the
/// manager treats the failed announcement as fatal and closes its gate.
#[tokio::test]
async fn test_failing_adapter_closes_gate_without_starving_others() {
    let memory = Arc::new(MemoryAdapter::new());
    let handled = Arc::new(AtomicUsize::new(0));
    let config = {
        let handled = Arc::clone(&handled);
        LoggerConfig::<LogEntryContext>::builder()
            .add_shared_adapter(memory.clone())
            .add_adapter(FailingAdapter {
                fail_on: events::ACTION_CREATED_AND_STARTED.name,
            })
            .error_handler(move |_entry, _err| {
                handled.fetch_add(1, Ordering::SeqCst);
            })
            .build()
    };
    let factory = LoggerFactory::new(SESSION, config).unwrap();
    let transactions = TransactionManager::new(SESSION, &factory, Arc::new(NoopRecorder)).unwrap();
    let actions = ActionManager::new(SESSION, &factory, Arc::new(NoopRecorder)).unwrap();

    let transaction = transactions.create_and_start().await.unwrap();
    let err = actions
        .create_and_start(
            &transaction,
            ActionType::APPLICATION_START,
            ActionCategory::Common,
            ActionGroup::APPLICATION,
            None,
            false,
        )
        .await
        .unwrap_err();

    match &err {
        ActionsError::Logging { source, .. } => {
            assert_eq!(source.kind(), LoggingErrorKind::AdapterWrite);
            assert_eq!(source.failed_adapters(), vec!["failing"]);
        }
        other => panic!("expected logging error, got {other}"),
    }
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(!actions.is_allowed_to_create());
    assert_eq!(actions.num_in_progress(), 0);

    // the healthy adapter still received the entry
    assert!(
        memory
            .entries()
            .iter()
            .any(|e| e.event == events::ACTION_CREATED_AND_STARTED)
    );

    // the drain does not hang on the action that never started
    tokio::time::timeout(Duration::from_millis(100), actions.wait())
        .await
        .unwrap();
    assert!(transactions.is_allowed_to_create());
}

/// The JSONL recorder captures every creation and completion in order.
#[tokio::test]
async fn test_records_follow_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("actions.jsonl");
    let recorder = Arc::new(JsonlRecorder::new(JsonlConfig::session(&path)).unwrap());
    let h = Harness::with_recorder(recorder.clone());

    let transaction = h.transactions.create_and_start().await.unwrap();
    let action = h
        .actions
        .create_and_start(
            &transaction,
            ActionType::IDENTITY_AUTHENTICATE,
            ActionCategory::Http,
            ActionGroup::NO_GROUP,
            None,
            false,
        )
        .await
        .unwrap();
    let operation = action
        .operations()
        .create_and_start(
            OperationType::IDENTITY_MANAGER_AUTHENTICATE,
            OperationCategory::Identity,
            OperationGroup::NO_GROUP,
            None,
            vec![OperationParam::new("user", "alice")],
        )
        .await
        .unwrap();
    action.operations().complete(&operation, false).await.unwrap();
    h.actions.complete(&action, false).await.unwrap();
    recorder.dispose().unwrap();

    let records = JsonlRecorder::read_records(&path).unwrap();
    assert_eq!(records.len(), 5);

    match &records[0] {
        Record::Transaction(t) => {
            assert_eq!(t.id, transaction.id());
            assert_eq!(t.app_session_id, SESSION);
            assert!(t.start_time.is_some());
        }
        other => panic!("expected transaction record, got {other:?}"),
    }
    match (&records[1], &records[4]) {
        (Record::Action(started), Record::Action(completed)) => {
            assert_eq!(started.id, action.id());
            assert_eq!(started.status, Status::Running);
            assert_eq!(started.category, ActionCategory::Http);
            assert_eq!(completed.status, Status::Failed);
            assert!(completed.end_time.is_some());
            assert!(completed.elapsed_ms.is_some());
        }
        other => panic!("expected action records, got {other:?}"),
    }
    match (&records[2], &records[3]) {
        (Record::Operation(started), Record::Operation(completed)) => {
            assert_eq!(started.id, operation.id());
            assert_eq!(started.action_id, action.id());
            assert_eq!(started.transaction_id, transaction.id());
            assert_eq!(started.params, vec![OperationParam::new("user", "alice")]);
            assert_eq!(completed.status, Status::Failed);
        }
        other => panic!("expected operation records, got {other:?}"),
    }
}

/// Executors thread the context through nested operations and log it.
#[tokio::test]
async fn test_executor_nests_operations_under_user_context() {
    let h = Harness::new();
    let executor = ActionExecutor::new(
        Arc::clone(&h.actions),
        h.factory.create_logger("tests.Executor").unwrap(),
    );
    let logger = h.factory.create_logger("tests.Handler").unwrap();

    let transaction = h.transactions.create_and_start().await.unwrap();
    let (outer_id, inner_parent) = executor
        .exec_with_operation(
            CancelSignal::new(),
            &transaction,
            ActionSpec::new(ActionType::HTTP_SERVER_PIPELINE_AUTHORIZE)
                .with_category(ActionCategory::Http),
            OperationSpec::new(OperationType::HTTP_SERVER_PIPELINE_AUTHORIZE),
            |ctx: OperationContext| {
                let executor = executor.operations().clone();
                let logger = logger.clone();
                async move {
                    let ctx = ctx.with_user(42);
                    let outer_id = ctx.operation().id();
                    let inner_parent = executor
                        .exec(
                            &ctx,
                            OperationSpec::new(OperationType::IDENTITY_MANAGER_AUTHORIZE)
                                .with_category(OperationCategory::Identity),
                            |inner: OperationContext| async move {
                                logger
                                    .info(inner.log_context(), "authorized", Vec::new())
                                    .await?;
                                Ok::<_, anyhow::Error>(inner.operation().parent_operation_id())
                            },
                        )
                        .await?;
                    Ok::<_, anyhow::Error>((outer_id, inner_parent))
                }
            },
        )
        .await
        .unwrap();

    assert_eq!(inner_parent, Some(outer_id));
    assert_eq!(h.actions.num_in_progress(), 0);

    let entries = h.memory.entries();
    let authorized = entries.iter().find(|e| e.message == "authorized").unwrap();
    assert_eq!(authorized.context.user_id, Some(42));
    assert_eq!(authorized.context.transaction.map(|t| t.id), Some(transaction.id()));
    assert_ne!(authorized.context.operation.map(|o| o.id), Some(outer_id));

    let completions = entries
        .iter()
        .filter(|e| e.event == events::OPERATION_COMPLETED)
        .count();
    assert_eq!(completions, 2);
}

/// After the logger factory is disposed, managers fail closed.
#[tokio::test]
async fn test_disposed_factory_fails_closed() {
    let h = Harness::new();
    let transaction = h.transactions.create_and_start().await.unwrap();

    h.factory.dispose().unwrap();

    let err = h.transactions.create_and_start().await.unwrap_err();
    assert!(matches!(err, ActionsError::Logging { .. }));
    assert!(!h.transactions.is_allowed_to_create());

    let err = h
        .actions
        .create_and_start(
            &transaction,
            ActionType::APPLICATION_STOP,
            ActionCategory::Common,
            ActionGroup::APPLICATION,
            None,
            false,
        )
        .await
        .unwrap_err();
    match err {
        ActionsError::Logging { source, .. } => {
            assert_eq!(source.kind(), LoggingErrorKind::Disposed)
        }
        other => panic!("expected logging error, got {other}"),
    }
    assert!(!h.actions.is_allowed_to_create());
    assert!(h.memory.is_disposed());
}

/// An operation context refuses to adopt an operation from another
/// transaction.
#[tokio::test]
async fn test_context_rejects_foreign_operation() {
    let h = Harness::new();
    let first = h.transactions.create_and_start().await.unwrap();
    let second = h.transactions.create_and_start().await.unwrap();

    let mut operations = Vec::new();
    let mut actions = Vec::new();
    for transaction in [&first, &second] {
        let action = h
            .actions
            .create_and_start(
                transaction,
                ActionType::APPLICATION_START,
                ActionCategory::Common,
                ActionGroup::APPLICATION,
                None,
                false,
            )
            .await
            .unwrap();
        let operation = action
            .operations()
            .create_and_start(
                OperationType::APPLICATION_START,
                OperationCategory::Common,
                OperationGroup::APPLICATION,
                None,
                Vec::new(),
            )
            .await
            .unwrap();
        operations.push(operation);
        actions.push(action);
    }

    let ctx = OperationContext::new(CancelSignal::new(), Arc::clone(&operations[0]));
    let err = ctx
        .with_operation(Arc::clone(&operations[1]))
        .unwrap_err();
    assert!(matches!(err, ActionsError::ForeignAction { .. }));

    for (action, operation) in actions.iter().zip(&operations) {
        action.operations().complete(operation, true).await.unwrap();
        h.actions.complete(action, true).await.unwrap();
    }
}

/// Completing an action through a manager that did not create it is refused
/// and leaves both managers' drains intact.
#[tokio::test]
async fn test_complete_through_other_manager_is_rejected() {
    let h = Harness::new();
    let other = ActionManager::new(SESSION, &h.factory, Arc::new(NoopRecorder)).unwrap();
    let transaction = h.transactions.create_and_start().await.unwrap();

    let mut started = Vec::new();
    for manager in [h.actions.as_ref(), &other] {
        let action = manager
            .create_and_start(
                &transaction,
                ActionType::APPLICATION_START,
                ActionCategory::Common,
                ActionGroup::APPLICATION,
                None,
                false,
            )
            .await
            .unwrap();
        started.push(action);
    }
    let (mine, theirs) = (&started[0], &started[1]);

    let err = other.complete(mine, true).await.unwrap_err();
    assert!(matches!(err, ActionsError::ForeignAction { .. }));
    assert_eq!(err.entity(), EntityKind::Action);
    assert!(!other.is_allowed_to_create());
    assert_eq!(mine.status(), Status::Running);
    assert_eq!(other.num_in_progress(), 1);

    // the other manager still owes its own action
    assert!(
        tokio::time::timeout(Duration::from_millis(50), other.wait())
            .await
            .is_err()
    );

    other.complete(theirs, true).await.unwrap();
    tokio::time::timeout(Duration::from_millis(100), other.wait())
        .await
        .unwrap();

    h.actions.complete(mine, true).await.unwrap();
    tokio::time::timeout(Duration::from_millis(100), h.actions.wait())
        .await
        .unwrap();
    assert!(h.actions.is_allowed_to_create());
}

/// A drain returns only after the completion of every action and operation
/// has been logged.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wait_returns_after_completion_is_logged() {
    let memory = Arc::new(MemoryAdapter::new());
    let config = LoggerConfig::<LogEntryContext>::builder()
        .add_adapter(SlowCompletionAdapter {
            delay: Duration::from_millis(200),
            inner: Arc::clone(&memory),
        })
        .build();
    let factory = LoggerFactory::new(SESSION, config).unwrap();
    let transactions = TransactionManager::new(SESSION, &factory, Arc::new(NoopRecorder)).unwrap();
    let actions = Arc::new(ActionManager::new(SESSION, &factory, Arc::new(NoopRecorder)).unwrap());

    let transaction = transactions.create_and_start().await.unwrap();
    let action = actions
        .create_and_start(
            &transaction,
            ActionType::APPLICATION_STOP,
            ActionCategory::Common,
            ActionGroup::APPLICATION,
            None,
            false,
        )
        .await
        .unwrap();
    let operation = action
        .operations()
        .create_and_start(
            OperationType::APPLICATION_CONTROLLER_STOP,
            OperationCategory::Common,
            OperationGroup::APPLICATION,
            None,
            Vec::new(),
        )
        .await
        .unwrap();

    let completing = {
        let actions = Arc::clone(&actions);
        let action = Arc::clone(&action);
        let operation = Arc::clone(&operation);
        tokio::spawn(async move {
            let operations = action.operations();
            let (op, act) = tokio::join!(
                operations.complete(&operation, true),
                actions.complete(&action, true)
            );
            op.and(act)
        })
    };

    tokio::time::timeout(Duration::from_secs(5), actions.wait())
        .await
        .unwrap();
    let logged: Vec<_> = memory.entries().iter().map(|e| e.event.name).collect();
    assert!(logged.contains(&events::OPERATION_COMPLETED.name));
    assert!(logged.contains(&events::ACTION_COMPLETED.name));
    assert_eq!(actions.num_in_progress(), 0);

    completing.await.unwrap().unwrap();
}
