//! Causality tracking: transactions, actions and operations.
//!
//! Every unit of work runs inside a [`Transaction`] → [`Action`] →
//! [`Operation`] chain, and every log line written on its behalf carries
//! that chain in its [`LogEntryContext`](causeway_logging::LogEntryContext).
//!
//! The managers share one pattern: gated creation plus graceful drain.
//! `allow_to_create(false)` rejects new work, `wait()` returns once the
//! work already admitted has completed. Shutdown closes the action gate
//! first, drains, then does the same for transactions.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use causeway_actions::{
//!     ActionCategory, ActionGroup, ActionManager, ActionType, NoopRecorder, OperationCategory,
//!     OperationGroup, OperationParam, OperationType, TransactionManager,
//! };
//! use causeway_logging::{LogEntryContext, LoggerConfig, LoggerFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = 42;
//!     let factory = LoggerFactory::new(session, LoggerConfig::<LogEntryContext>::builder().build())?;
//!     let transactions = TransactionManager::new(session, &factory, Arc::new(NoopRecorder))?;
//!     let actions = ActionManager::new(session, &factory, Arc::new(NoopRecorder))?;
//!
//!     let tx = transactions.create_and_start().await?;
//!     let action = actions
//!         .create_and_start(&tx, ActionType::APPLICATION_START, ActionCategory::Common, ActionGroup::APPLICATION, None, false)
//!         .await?;
//!     let op = action
//!         .operations()
//!         .create_and_start(
//!             OperationType::APPLICATION_START,
//!             OperationCategory::Common,
//!             OperationGroup::APPLICATION,
//!             None,
//!             vec![OperationParam::new("id", 1)],
//!         )
//!         .await?;
//!     action.operations().complete(&op, true).await?;
//!     actions.complete(&action, true).await?;
//!
//!     actions.allow_to_create(false);
//!     actions.wait().await;
//!     transactions.allow_to_create(false);
//!     transactions.wait().await;
//!     factory.dispose()?;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod action_manager;
pub mod cancel;
pub mod context;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod operation;
pub mod recorder;
pub mod transaction;
pub mod transaction_manager;
pub mod types;
pub mod wait_group;

pub use action::Action;
pub use action_manager::ActionManager;
pub use cancel::CancelSignal;
pub use context::{ActionContext, OperationContext};
pub use error::{ActionsError, Result};
pub use executor::{ActionExecutor, ActionSpec, OperationExecutor, OperationSpec, StopHandle};
pub use lifecycle::{Completion, LifecycleError};
pub use operation::{Operation, OperationManager};
pub use recorder::{
    ActionRecord, ActionRecorder, JsonlRecorder, NoopRecorder, OperationRecord, Record,
    RecordError, TransactionRecord,
};
pub use transaction::Transaction;
pub use transaction_manager::TransactionManager;
pub use types::{
    ActionCategory, ActionGroup, ActionType, EntityKind, OperationCategory, OperationGroup,
    OperationParam, OperationType, Status,
};
pub use wait_group::{WaitGroup, WaitGroupGuard};
