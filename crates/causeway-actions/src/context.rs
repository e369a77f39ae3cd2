//! Propagation handles threaded through request and job code.
//!
//! A context is created once per unit of work and cloned into nested
//! calls. A clone may point at a different action or operation, never at a
//! different transaction, so every log line it produces correlates to one
//! causal chain.

use std::sync::Arc;

use causeway_logging::LogEntryContext;

use crate::action::Action;
use crate::cancel::CancelSignal;
use crate::error::{ActionsError, Result};
use crate::operation::Operation;
use crate::transaction::Transaction;

/// Context handed to code running inside an action, before any operation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    cancel: CancelSignal,
    transaction: Arc<Transaction>,
    action: Arc<Action>,
}

impl ActionContext {
    pub fn new(cancel: CancelSignal, action: Arc<Action>) -> Self {
        Self {
            cancel,
            transaction: Arc::clone(action.transaction()),
            action,
        }
    }

    pub fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn app_session_id(&self) -> u64 {
        self.transaction.app_session_id()
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    /// Enter `operation`, which must belong to this context's action.
    pub fn with_operation(&self, operation: Arc<Operation>) -> Result<OperationContext> {
        if operation.action_id() != self.action.id() {
            return Err(ActionsError::ForeignOperation {
                manager: "ActionContext",
                id: operation.id(),
                owner: operation.action_id(),
                expected: self.action.id(),
            });
        }
        Ok(OperationContext::new(self.cancel.clone(), operation))
    }

    pub fn log_context(&self) -> LogEntryContext {
        self.action.log_context()
    }
}

/// Context carrying the current transaction, action and operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    cancel: CancelSignal,
    app_session_id: u64,
    transaction: Arc<Transaction>,
    action: Arc<Action>,
    operation: Arc<Operation>,
    user_id: Option<u64>,
    client_id: Option<u64>,
}

impl OperationContext {
    pub fn new(cancel: CancelSignal, operation: Arc<Operation>) -> Self {
        let action = Arc::clone(operation.action());
        let transaction = Arc::clone(action.transaction());
        Self {
            cancel,
            app_session_id: transaction.app_session_id(),
            transaction,
            action,
            operation,
            user_id: None,
            client_id: None,
        }
    }

    pub fn with_user(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_client(mut self, client_id: u64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Clone this context onto another operation of the same transaction.
    ///
    /// The acting user and client carry over.
    pub fn with_operation(&self, operation: Arc<Operation>) -> Result<Self> {
        let transaction_id = operation.transaction().id();
        if transaction_id != self.transaction.id() {
            return Err(ActionsError::ForeignAction {
                manager: "OperationContext",
                id: operation.action_id(),
                owner: transaction_id,
                expected: self.transaction.id(),
            });
        }

        Ok(Self {
            action: Arc::clone(operation.action()),
            operation,
            ..self.clone()
        })
    }

    pub fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn app_session_id(&self) -> u64 {
        self.app_session_id
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    /// Correlation context for log entries written on behalf of this context.
    pub fn log_context(&self) -> LogEntryContext {
        let mut ctx = self.operation.log_context();
        ctx.user_id = self.user_id;
        ctx
    }
}

impl From<&OperationContext> for LogEntryContext {
    fn from(ctx: &OperationContext) -> Self {
        ctx.log_context()
    }
}
