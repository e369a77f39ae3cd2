use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use causeway_logging::{ActionInfo, LogEntryContext};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::lifecycle::{Completion, Lifecycle, LifecycleError};
use crate::operation::OperationManager;
use crate::recorder::ActionRecord;
use crate::transaction::Transaction;
use crate::types::{ActionCategory, ActionGroup, ActionType, Status};

/// A unit of work inside a transaction. Owns the manager of its operations.
pub struct Action {
    pub(crate) id: Uuid,
    /// Identity of the manager that registered this action.
    pub(crate) manager_id: Uuid,
    pub(crate) transaction: Arc<Transaction>,
    pub(crate) action_type: ActionType,
    pub(crate) category: ActionCategory,
    pub(crate) group: ActionGroup,
    pub(crate) parent_action_id: Option<Uuid>,
    pub(crate) is_background: bool,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) operations: OperationManager,
}

impl Action {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction.id()
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn category(&self) -> ActionCategory {
        self.category
    }

    pub fn group(&self) -> ActionGroup {
        self.group
    }

    pub fn parent_action_id(&self) -> Option<Uuid> {
        self.parent_action_id
    }

    pub fn is_background(&self) -> bool {
        self.is_background
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

    /// Manager for the operations of this action.
    pub fn operations(&self) -> &OperationManager {
        &self.operations
    }

    pub fn log_info(&self) -> ActionInfo {
        ActionInfo {
            id: self.id,
            action_type: self.action_type.0,
            category: self.category as u16,
            group: self.group.0,
        }
    }

    pub fn log_context(&self) -> LogEntryContext {
        let mut ctx = self.transaction.log_context();
        ctx.action = Some(self.log_info());
        ctx
    }

    pub fn to_record(&self) -> ActionRecord {
        let completion = self.lifecycle.completion();
        ActionRecord {
            id: self.id,
            transaction_id: self.transaction.id(),
            app_session_id: self.transaction.app_session_id(),
            action_type: self.action_type,
            category: self.category,
            group: self.group,
            parent_action_id: self.parent_action_id,
            is_background: self.is_background,
            status: self.status(),
            created_at: self.created_at(),
            start_time: self.start_time(),
            end_time: completion.map(|c| c.end_time),
            elapsed_ms: completion.map(|c| c.elapsed.as_millis() as u64),
        }
    }

    /// Close the operation gate, drain running operations, then finish.
    pub(crate) async fn complete(&self, succeeded: bool) -> Result<Completion, LifecycleError> {
        self.lifecycle.ensure_running()?;
        self.operations.allow_to_create(false);
        self.operations.wait().await;
        self.lifecycle.complete(succeeded)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("transaction_id", &self.transaction.id())
            .field("action_type", &self.action_type)
            .field("category", &self.category)
            .field("parent_action_id", &self.parent_action_id)
            .field("is_background", &self.is_background)
            .field("status", &self.status())
            .finish()
    }
}
