//! Run async closures inside freshly created actions and operations.
//!
//! The executors own the create / complete bracket: the entity is completed
//! with `succeeded = result.is_ok()` no matter how the closure ends, and a
//! completion failure is escalated instead of being returned in place of
//! the closure's own result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use causeway_logging::{LogEntryContext, Logger};
use uuid::Uuid;

use crate::action::Action;
use crate::action_manager::ActionManager;
use crate::cancel::CancelSignal;
use crate::context::{ActionContext, OperationContext};
use crate::error::ActionsError;
use crate::operation::Operation;
use crate::transaction::Transaction;
use crate::types::{
    ActionCategory, ActionGroup, ActionType, OperationCategory, OperationGroup, OperationParam,
    OperationType,
};

/// Something that can ask the application to shut down.
pub trait StopHandle: Send + Sync {
    fn request_stop(&self);
}

/// Classification of the action an executor creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub action_type: ActionType,
    pub category: ActionCategory,
    pub group: ActionGroup,
    pub parent_action_id: Option<Uuid>,
    pub is_background: bool,
}

impl ActionSpec {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            category: ActionCategory::Common,
            group: ActionGroup::NO_GROUP,
            parent_action_id: None,
            is_background: false,
        }
    }

    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_group(mut self, group: ActionGroup) -> Self {
        self.group = group;
        self
    }

    pub fn with_parent(mut self, parent_action_id: Uuid) -> Self {
        self.parent_action_id = Some(parent_action_id);
        self
    }

    pub fn background(mut self) -> Self {
        self.is_background = true;
        self
    }
}

/// Classification and parameters of the operation an executor creates.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub operation_type: OperationType,
    pub category: OperationCategory,
    pub group: OperationGroup,
    pub parent_operation_id: Option<Uuid>,
    pub params: Vec<OperationParam>,
}

impl OperationSpec {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            category: OperationCategory::Common,
            group: OperationGroup::NO_GROUP,
            parent_operation_id: None,
            params: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: OperationCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_group(mut self, group: OperationGroup) -> Self {
        self.group = group;
        self
    }

    pub fn with_parent(mut self, parent_operation_id: Uuid) -> Self {
        self.parent_operation_id = Some(parent_operation_id);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl serde::Serialize) -> Self {
        self.params.push(OperationParam::new(name, value));
        self
    }
}

#[derive(Clone)]
struct Escalation {
    logger: Logger<LogEntryContext>,
    stop: Option<Arc<dyn StopHandle>>,
    stop_app_if_error: bool,
}

impl Escalation {
    async fn report(&self, ctx: LogEntryContext, err: &ActionsError, message: &str) {
        match &self.stop {
            Some(stop) if self.stop_app_if_error => {
                let _ = self
                    .logger
                    .fatal_with_error(ctx, err, message, Vec::new())
                    .await;
                stop.request_stop();
            }
            _ => {
                let _ = self
                    .logger
                    .error_with_error(ctx, err, message, Vec::new())
                    .await;
            }
        }
    }
}

/// Runs closures inside operations of an existing action.
#[derive(Clone)]
pub struct OperationExecutor {
    escalation: Escalation,
}

impl OperationExecutor {
    pub fn new(logger: Logger<LogEntryContext>) -> Self {
        Self {
            escalation: Escalation {
                logger,
                stop: None,
                stop_app_if_error: false,
            },
        }
    }

    pub fn with_stop_handle(mut self, stop: Arc<dyn StopHandle>, stop_app_if_error: bool) -> Self {
        self.escalation.stop = Some(stop);
        self.escalation.stop_app_if_error = stop_app_if_error;
        self
    }

    /// Run `f` in a nested operation of `ctx`'s action.
    ///
    /// Unless `spec` names a parent, the current operation becomes the parent.
    pub async fn exec<T, E, F, Fut>(
        &self,
        ctx: &OperationContext,
        mut spec: OperationSpec,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ActionsError>,
    {
        spec.parent_operation_id = spec.parent_operation_id.or(Some(ctx.operation().id()));
        let operation = self.start(ctx.action(), spec).await?;

        let nested = match ctx.with_operation(Arc::clone(&operation)) {
            Ok(nested) => nested,
            Err(err) => {
                self.complete(&operation, false).await;
                return Err(err.into());
            }
        };

        let result = f(nested).await;
        self.complete(&operation, result.is_ok()).await;
        result
    }

    /// Run `f` in a top-level operation of the action behind `ctx`.
    pub async fn exec_in_action<T, E, F, Fut>(
        &self,
        ctx: &ActionContext,
        spec: OperationSpec,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ActionsError>,
    {
        let operation = self.start(ctx.action(), spec).await?;

        let nested = match ctx.with_operation(Arc::clone(&operation)) {
            Ok(nested) => nested,
            Err(err) => {
                self.complete(&operation, false).await;
                return Err(err.into());
            }
        };

        let result = f(nested).await;
        self.complete(&operation, result.is_ok()).await;
        result
    }

    async fn start(
        &self,
        action: &Action,
        spec: OperationSpec,
    ) -> Result<Arc<Operation>, ActionsError> {
        action
            .operations()
            .create_and_start(
                spec.operation_type,
                spec.category,
                spec.group,
                spec.parent_operation_id,
                spec.params,
            )
            .await
    }

    async fn complete(&self, operation: &Arc<Operation>, succeeded: bool) {
        let manager = operation.action().operations();
        if let Err(err) = manager.complete(operation, succeeded).await {
            self.escalation
                .report(operation.log_context(), &err, "failed to complete operation")
                .await;
        }
    }
}

impl fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("logger", &self.escalation.logger.category())
            .field("stop_app_if_error", &self.escalation.stop_app_if_error)
            .finish()
    }
}

/// Runs closures inside newly created actions.
#[derive(Clone)]
pub struct ActionExecutor {
    actions: Arc<ActionManager>,
    operations: OperationExecutor,
}

impl ActionExecutor {
    pub fn new(actions: Arc<ActionManager>, logger: Logger<LogEntryContext>) -> Self {
        Self {
            actions,
            operations: OperationExecutor::new(logger),
        }
    }

    pub fn with_stop_handle(mut self, stop: Arc<dyn StopHandle>, stop_app_if_error: bool) -> Self {
        self.operations = self.operations.with_stop_handle(stop, stop_app_if_error);
        self
    }

    /// Executor for operations nested in the actions this executor runs.
    pub fn operations(&self) -> &OperationExecutor {
        &self.operations
    }

    /// Run `f` inside a new action of `transaction`.
    pub async fn exec<T, E, F, Fut>(
        &self,
        cancel: CancelSignal,
        transaction: &Arc<Transaction>,
        spec: ActionSpec,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(ActionContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ActionsError>,
    {
        let action = self
            .actions
            .create_and_start(
                transaction,
                spec.action_type,
                spec.category,
                spec.group,
                spec.parent_action_id,
                spec.is_background,
            )
            .await?;

        let result = f(ActionContext::new(cancel, Arc::clone(&action))).await;

        if let Err(err) = self.actions.complete(&action, result.is_ok()).await {
            self.operations
                .escalation
                .report(action.log_context(), &err, "failed to complete action")
                .await;
        }
        result
    }

    /// Run `f` inside a new action holding a single operation.
    pub async fn exec_with_operation<T, E, F, Fut>(
        &self,
        cancel: CancelSignal,
        transaction: &Arc<Transaction>,
        spec: ActionSpec,
        operation: OperationSpec,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(OperationContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ActionsError>,
    {
        self.exec(cancel, transaction, spec, |ctx| async move {
            self.operations.exec_in_action(&ctx, operation, f).await
        })
        .await
    }
}

impl fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("actions", &self.actions)
            .field("operations", &self.operations)
            .finish()
    }
}
