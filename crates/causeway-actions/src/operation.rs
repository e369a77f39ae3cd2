//! Operations and the per-action operation manager.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use causeway_logging::{
    Field, IdGeneratorError, LogEntryContext, Logger, OperationInfo, events,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::action::Action;
use crate::error::{ActionsError, Result};
use crate::lifecycle::{Completion, Lifecycle};
use crate::recorder::{ActionRecorder, OperationRecord};
use crate::transaction::Transaction;
use crate::types::{
    EntityKind, OperationCategory, OperationGroup, OperationParam, OperationType, Status,
};
use crate::wait_group::WaitGroup;

const MANAGER: &str = "OperationManager";

/// A step inside exactly one action.
pub struct Operation {
    id: Uuid,
    action: Arc<Action>,
    operation_type: OperationType,
    category: OperationCategory,
    group: OperationGroup,
    parent_operation_id: Option<Uuid>,
    params: Vec<OperationParam>,
    pub(crate) lifecycle: Lifecycle,
}

impl Operation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn action_id(&self) -> Uuid {
        self.action.id()
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        self.action.transaction()
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn category(&self) -> OperationCategory {
        self.category
    }

    pub fn group(&self) -> OperationGroup {
        self.group
    }

    pub fn parent_operation_id(&self) -> Option<Uuid> {
        self.parent_operation_id
    }

    pub fn params(&self) -> &[OperationParam] {
        &self.params
    }

    pub fn status(&self) -> Status {
        self.lifecycle.status()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.lifecycle.created_at()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.start_time()
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.completion().map(|c| c.end_time)
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.lifecycle.completion().map(|c| c.elapsed)
    }

    pub fn log_info(&self) -> OperationInfo {
        OperationInfo {
            id: self.id,
            operation_type: self.operation_type.0,
            category: self.category as u16,
            group: self.group.0,
        }
    }

    pub fn log_context(&self) -> LogEntryContext {
        let mut ctx = self.action.log_context();
        ctx.operation = Some(self.log_info());
        ctx
    }

    pub fn to_record(&self) -> OperationRecord {
        let completion = self.lifecycle.completion();
        OperationRecord {
            id: self.id,
            action_id: self.action.id(),
            transaction_id: self.transaction().id(),
            app_session_id: self.transaction().app_session_id(),
            operation_type: self.operation_type,
            category: self.category,
            group: self.group,
            parent_operation_id: self.parent_operation_id,
            status: self.status(),
            created_at: self.created_at(),
            start_time: self.start_time(),
            end_time: completion.map(|c| c.end_time),
            elapsed_ms: completion.map(|c| c.elapsed.as_millis() as u64),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("action_id", &self.action.id())
            .field("operation_type", &self.operation_type)
            .field("category", &self.category)
            .field("parent_operation_id", &self.parent_operation_id)
            .field("status", &self.status())
            .finish()
    }
}

/// Operation ids embed their owner.
///
/// Bytes 0..6 hold the low six bytes of the session id, bytes 6..14 the
/// action's sequence half and bytes 14..16 a per-action counter, all
/// little-endian. The counter starts at 1, so an action holds at most
/// 65535 operations.
#[derive(Debug)]
struct OperationIdGenerator {
    prefix: [u8; 14],
    sequence: AtomicU32,
}

impl OperationIdGenerator {
    fn new(app_session_id: u64, action_id: Uuid) -> Self {
        let mut prefix = [0u8; 14];
        prefix[..6].copy_from_slice(&app_session_id.to_le_bytes()[..6]);
        prefix[6..].copy_from_slice(&action_id.as_u64_pair().1.to_le_bytes());
        Self {
            prefix,
            sequence: AtomicU32::new(0),
        }
    }

    fn next_id(&self) -> std::result::Result<Uuid, IdGeneratorError> {
        let max = u32::from(u16::MAX);
        let previous = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < max).then_some(s + 1)
            })
            .map_err(|_| IdGeneratorError::Exhausted {
                sequence: "operation sequence",
                index: 0,
            })?;

        let mut bytes = [0u8; 16];
        bytes[..14].copy_from_slice(&self.prefix);
        bytes[14..].copy_from_slice(&((previous + 1) as u16).to_le_bytes());
        Ok(Uuid::from_bytes(bytes))
    }
}

/// Creates and completes the operations of one action.
///
/// There is no public gate: the owning action closes it when it completes,
/// then waits for the operations still in progress.
pub struct OperationManager {
    action: Weak<Action>,
    action_id: Uuid,
    ids: OperationIdGenerator,
    logger: Logger<LogEntryContext>,
    recorder: Arc<dyn ActionRecorder>,
    allow_to_create: AtomicBool,
    in_progress: WaitGroup,
    counter: AtomicU64,
    num_created: AtomicU64,
    num_in_progress: AtomicU64,
}

impl OperationManager {
    pub(crate) fn new(
        action: Weak<Action>,
        action_id: Uuid,
        app_session_id: u64,
        logger: Logger<LogEntryContext>,
        recorder: Arc<dyn ActionRecorder>,
    ) -> Self {
        Self {
            action,
            action_id,
            ids: OperationIdGenerator::new(app_session_id, action_id),
            logger,
            recorder,
            allow_to_create: AtomicBool::new(true),
            in_progress: WaitGroup::new(),
            counter: AtomicU64::new(0),
            num_created: AtomicU64::new(0),
            num_in_progress: AtomicU64::new(0),
        }
    }

    pub fn action_id(&self) -> Uuid {
        self.action_id
    }

    /// Create an operation under the owning action and mark it running.
    pub async fn create_and_start(
        &self,
        operation_type: OperationType,
        category: OperationCategory,
        group: OperationGroup,
        parent_operation_id: Option<Uuid>,
        params: Vec<OperationParam>,
    ) -> Result<Arc<Operation>> {
        let registration = self.in_progress.add();
        if !self.is_allowed_to_create() {
            return Err(ActionsError::NotAllowedToCreate {
                manager: MANAGER,
                entity: EntityKind::Operation,
            });
        }

        let action = self.action.upgrade().ok_or(ActionsError::ActionDropped {
            manager: MANAGER,
            id: self.action_id,
        })?;

        let id = self.ids.next_id().map_err(|source| {
            self.allow_to_create(false);
            ActionsError::IdGeneration {
                manager: MANAGER,
                entity: EntityKind::Operation,
                source,
            }
        })?;
        self.counter.fetch_add(1, Ordering::Relaxed);

        let operation = Arc::new(Operation {
            id,
            action,
            operation_type,
            category,
            group,
            parent_operation_id,
            params,
            lifecycle: Lifecycle::new(Utc::now()),
        });
        operation
            .lifecycle
            .start()
            .map_err(|source| ActionsError::Lifecycle {
                manager: MANAGER,
                entity: EntityKind::Operation,
                id,
                source,
            })?;

        if let Err(err) = self.announce_created(&operation).await {
            self.allow_to_create(false);
            let _ = operation.lifecycle.complete(false);
            return Err(err);
        }

        registration.keep();
        self.num_created.fetch_add(1, Ordering::Relaxed);
        self.num_in_progress.fetch_add(1, Ordering::Relaxed);
        Ok(operation)
    }

    /// Move an operation of this action to its terminal status.
    pub async fn complete(&self, operation: &Arc<Operation>, succeeded: bool) -> Result<()> {
        let result = self.finish(operation, succeeded).await;
        if let Err(err) = &result {
            let _ = self
                .logger
                .warning_with_error(
                    operation.log_context(),
                    err,
                    "failed to complete operation",
                    Vec::new(),
                )
                .await;
        }
        result
    }

    async fn announce_created(&self, operation: &Operation) -> Result<()> {
        self.recorder
            .record_operation(operation)
            .map_err(|source| ActionsError::Record {
                manager: MANAGER,
                entity: EntityKind::Operation,
                id: operation.id(),
                source,
            })?;

        let mut fields = vec![Field::new("operation_type", operation.operation_type().0)];
        if let Some(parent) = operation.parent_operation_id() {
            fields.push(Field::new("parent_operation_id", parent));
        }
        if !operation.params().is_empty() {
            fields.push(Field::new("params", operation.params()));
        }

        self.logger
            .info_with_event(
                operation.log_context(),
                events::OPERATION_CREATED_AND_STARTED,
                "operation created and started",
                fields,
            )
            .await
            .map_err(|source| ActionsError::Logging {
                manager: MANAGER,
                entity: EntityKind::Operation,
                id: operation.id(),
                source,
            })
    }

    async fn finish(&self, operation: &Arc<Operation>, succeeded: bool) -> Result<()> {
        if operation.action_id() != self.action_id {
            self.allow_to_create(false);
            return Err(ActionsError::ForeignOperation {
                manager: MANAGER,
                id: operation.id(),
                owner: operation.action_id(),
                expected: self.action_id,
            });
        }

        let completion = operation
            .lifecycle
            .complete(succeeded)
            .map_err(|source| {
                self.allow_to_create(false);
                ActionsError::Lifecycle {
                    manager: MANAGER,
                    entity: EntityKind::Operation,
                    id: operation.id(),
                    source,
                }
            })?;
        let _registration = self.in_progress.release();
        let announced = self.announce_completed(operation, completion).await;
        self.num_in_progress.fetch_sub(1, Ordering::Relaxed);

        announced.inspect_err(|_| {
            self.allow_to_create(false);
        })
    }

    async fn announce_completed(&self, operation: &Operation, completion: Completion) -> Result<()> {
        self.recorder
            .record_operation(operation)
            .map_err(|source| ActionsError::Record {
                manager: MANAGER,
                entity: EntityKind::Operation,
                id: operation.id(),
                source,
            })?;

        self.logger
            .info_with_event(
                operation.log_context(),
                events::OPERATION_COMPLETED,
                "operation completed",
                vec![
                    Field::new("status", operation.status()),
                    Field::new("elapsed_ms", completion.elapsed.as_millis() as u64),
                ],
            )
            .await
            .map_err(|source| ActionsError::Logging {
                manager: MANAGER,
                entity: EntityKind::Operation,
                id: operation.id(),
                source,
            })
    }

    pub(crate) fn allow_to_create(&self, allow: bool) {
        self.allow_to_create.store(allow, Ordering::SeqCst);
    }

    pub fn is_allowed_to_create(&self) -> bool {
        self.allow_to_create.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait(&self) {
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

impl fmt::Debug for OperationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationManager")
            .field("action_id", &self.action_id)
            .field("allow_to_create", &self.is_allowed_to_create())
            .field("num_in_progress", &self.num_in_progress())
            .finish()
    }
}
