use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use causeway_logging::{Field, IdGenerator, LogEntryContext, Logger, LoggerFactory, events};
use chrono::Utc;
use uuid::Uuid;

use crate::action::Action;
use crate::error::{ActionsError, Result};
use crate::lifecycle::{Completion, Lifecycle};
use crate::operation::OperationManager;
use crate::recorder::ActionRecorder;
use crate::transaction::Transaction;
use crate::types::{ActionCategory, ActionGroup, ActionType, EntityKind};
use crate::wait_group::WaitGroup;

const MANAGER: &str = "ActionManager";

/// Creates, completes and drains the actions of one application session.
///
/// Each action carries its own [`OperationManager`], which logs through the
/// `actions.OperationManager` category of the same factory.
pub struct ActionManager {
    id: Uuid,
    app_session_id: u64,
    ids: IdGenerator,
    logger: Logger<LogEntryContext>,
    operation_logger: Logger<LogEntryContext>,
    recorder: Arc<dyn ActionRecorder>,
    allow_to_create: AtomicBool,
    in_progress: WaitGroup,
    counter: AtomicU64,
    num_created: AtomicU64,
    num_in_progress: AtomicU64,
}

impl ActionManager {
    pub fn new(
        app_session_id: u64,
        logger_factory: &LoggerFactory<LogEntryContext>,
        recorder: Arc<dyn ActionRecorder>,
    ) -> Result<Self> {
        let create_logger = |category: &str| {
            logger_factory
                .create_logger(category)
                .map_err(|source| ActionsError::Logger {
                    manager: MANAGER,
                    entity: EntityKind::Action,
                    source,
                })
        };
        let logger = create_logger("actions.ActionManager")?;
        let operation_logger = create_logger("actions.OperationManager")?;
        let ids = IdGenerator::with_default_concurrency(app_session_id).map_err(|source| {
            ActionsError::IdGeneration {
                manager: MANAGER,
                entity: EntityKind::Action,
                source,
            }
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            app_session_id,
            ids,
            logger,
            operation_logger,
            recorder,
            allow_to_create: AtomicBool::new(true),
            in_progress: WaitGroup::new(),
            counter: AtomicU64::new(0),
            num_created: AtomicU64::new(0),
            num_in_progress: AtomicU64::new(0),
        })
    }

    pub fn app_session_id(&self) -> u64 {
        self.app_session_id
    }

    /// Create an action under `transaction` and mark it running.
    ///
    /// `parent_action_id` is only set when continuing work that started in
    /// another process.
    pub async fn create_and_start(
        &self,
        transaction: &Arc<Transaction>,
        action_type: ActionType,
        category: ActionCategory,
        group: ActionGroup,
        parent_action_id: Option<Uuid>,
        is_background: bool,
    ) -> Result<Arc<Action>> {
        let registration = self.in_progress.add();
        if !self.is_allowed_to_create() {
            return Err(ActionsError::NotAllowedToCreate {
                manager: MANAGER,
                entity: EntityKind::Action,
            });
        }

        self.validate_transaction(transaction).inspect_err(|_| {
            self.allow_to_create(false);
        })?;

        let id = self.ids.next_id().map_err(|source| {
            self.allow_to_create(false);
            ActionsError::IdGeneration {
                manager: MANAGER,
                entity: EntityKind::Action,
                source,
            }
        })?;
        self.counter.fetch_add(1, Ordering::Relaxed);

        let action = Arc::new_cyclic(|weak| Action {
            id,
            manager_id: self.id,
            transaction: Arc::clone(transaction),
            action_type,
            category,
            group,
            parent_action_id,
            is_background,
            lifecycle: Lifecycle::new(Utc::now()),
            operations: OperationManager::new(
                weak.clone(),
                id,
                self.app_session_id,
                self.operation_logger.clone(),
                Arc::clone(&self.recorder),
            ),
        });

        if let Err(err) = self.announce_created(&action).await {
            self.allow_to_create(false);
            action.operations.allow_to_create(false);
            let _ = action.lifecycle.complete(false);
            return Err(err);
        }

        registration.keep();
        self.num_created.fetch_add(1, Ordering::Relaxed);
        self.num_in_progress.fetch_add(1, Ordering::Relaxed);
        Ok(action)
    }

    /// Finish an action: drain its operations, then stamp it terminal.
    pub async fn complete(&self, action: &Arc<Action>, succeeded: bool) -> Result<()> {
        let result = self.finish(action, succeeded).await;
        if let Err(err) = &result {
            let _ = self
                .logger
                .warning_with_error(
                    action.log_context(),
                    err,
                    "failed to complete action",
                    Vec::new(),
                )
                .await;
        }
        result
    }

    fn validate_transaction(&self, transaction: &Transaction) -> Result<()> {
        if !transaction.is_started() {
            return Err(ActionsError::TransactionNotStarted {
                manager: MANAGER,
                id: transaction.id(),
            });
        }
        if transaction.app_session_id() != self.app_session_id {
            return Err(ActionsError::ForeignTransaction {
                manager: MANAGER,
                id: transaction.id(),
                owner: transaction.app_session_id(),
                expected: self.app_session_id,
            });
        }
        Ok(())
    }

    async fn announce_created(&self, action: &Action) -> Result<()> {
        let id = action.id();
        action
            .lifecycle
            .start()
            .map_err(|source| ActionsError::Lifecycle {
                manager: MANAGER,
                entity: EntityKind::Action,
                id,
                source,
            })?;

        self.recorder
            .record_action(action)
            .map_err(|source| ActionsError::Record {
                manager: MANAGER,
                entity: EntityKind::Action,
                id,
                source,
            })?;

        let mut fields = vec![Field::new("is_background", action.is_background())];
        if let Some(parent) = action.parent_action_id() {
            fields.push(Field::new("parent_action_id", parent));
        }

        self.logger
            .info_with_event(
                action.log_context(),
                events::ACTION_CREATED_AND_STARTED,
                "action created and started",
                fields,
            )
            .await
            .map_err(|source| ActionsError::Logging {
                manager: MANAGER,
                entity: EntityKind::Action,
                id,
                source,
            })
    }

    async fn finish(&self, action: &Arc<Action>, succeeded: bool) -> Result<()> {
        // only actions registered with this manager's wait group may release it
        if action.manager_id != self.id {
            self.allow_to_create(false);
            return Err(ActionsError::ForeignAction {
                manager: MANAGER,
                id: action.id(),
                owner: action.manager_id,
                expected: self.id,
            });
        }
        if let Err(err) = self.validate_transaction(action.transaction()) {
            self.allow_to_create(false);
            return Err(err);
        }

        let completion = action.complete(succeeded).await.map_err(|source| {
            self.allow_to_create(false);
            ActionsError::Lifecycle {
                manager: MANAGER,
                entity: EntityKind::Action,
                id: action.id(),
                source,
            }
        })?;
        let _registration = self.in_progress.release();
        let announced = self.announce_completed(action, completion).await;
        self.num_in_progress.fetch_sub(1, Ordering::Relaxed);

        announced.inspect_err(|_| {
            self.allow_to_create(false);
        })
    }

    async fn announce_completed(&self, action: &Action, completion: Completion) -> Result<()> {
        let id = action.id();
        self.recorder
            .record_action(action)
            .map_err(|source| ActionsError::Record {
                manager: MANAGER,
                entity: EntityKind::Action,
                id,
                source,
            })?;

        self.logger
            .info_with_event(
                action.log_context(),
                events::ACTION_COMPLETED,
                "action completed",
                vec![
                    Field::new("status", action.status()),
                    Field::new("elapsed_ms", completion.elapsed.as_millis() as u64),
                    Field::new("operations", action.operations().num_created()),
                ],
            )
            .await
            .map_err(|source| ActionsError::Logging {
                manager: MANAGER,
                entity: EntityKind::Action,
                id,
                source,
            })
    }

    pub fn allow_to_create(&self, allow: bool) {
        self.allow_to_create.store(allow, Ordering::SeqCst);
    }

    pub fn is_allowed_to_create(&self) -> bool {
        self.allow_to_create.load(Ordering::SeqCst)
    }

    /// Wait until every created action has completed.
    ///
    /// Call after `allow_to_create(false)`; otherwise new actions may keep
    /// the wait going.
    pub async fn wait(&self) {
        tracing::debug!(
            in_progress = self.in_progress.count(),
            "waiting for actions to complete"
        );
        self.in_progress.wait().await;
    }

    /// Number of identifiers issued.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn num_created(&self) -> u64 {
        self.num_created.load(Ordering::Relaxed)
    }

    pub fn num_in_progress(&self) -> u64 {
        self.num_in_progress.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ActionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionManager")
            .field("app_session_id", &self.app_session_id)
            .field("allow_to_create", &self.is_allowed_to_create())
            .field("num_created", &self.num_created())
            .field("num_in_progress", &self.num_in_progress())
            .finish()
    }
}
