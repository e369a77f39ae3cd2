//! Error types for the causality managers.

use causeway_logging::{
    EntryError, ErrorCode, FactoryError, IdGeneratorError, LoggingError, PlatformError,
};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::LifecycleError;
use crate::recorder::RecordError;
use crate::types::EntityKind;

/// Result type alias for manager operations.
pub type Result<T> = std::result::Result<T, ActionsError>;

/// Errors returned by the transaction, action and operation managers.
///
/// Every variant names the manager that produced it.
#[derive(Debug, Error)]
pub enum ActionsError {
    /// The manager's gate is closed.
    #[error("{manager}: not allowed to create {entity}s")]
    NotAllowedToCreate {
        manager: &'static str,
        entity: EntityKind,
    },

    #[error("{manager}: failed to generate {entity} id: {source}")]
    IdGeneration {
        manager: &'static str,
        entity: EntityKind,
        #[source]
        source: IdGeneratorError,
    },

    /// Invalid status transition, e.g. completing a completed action.
    #[error("{manager}: {entity} {id} {source}")]
    Lifecycle {
        manager: &'static str,
        entity: EntityKind,
        id: Uuid,
        #[source]
        source: LifecycleError,
    },

    #[error("{manager}: transaction {id} has not been started")]
    TransactionNotStarted { manager: &'static str, id: Uuid },

    #[error("{manager}: transaction {id} belongs to app session {owner}, expected {expected}")]
    ForeignTransaction {
        manager: &'static str,
        id: Uuid,
        owner: u64,
        expected: u64,
    },

    /// The action belongs to another transaction or was created by another manager.
    #[error("{manager}: action {id} belongs to {owner}, expected {expected}")]
    ForeignAction {
        manager: &'static str,
        id: Uuid,
        owner: Uuid,
        expected: Uuid,
    },

    #[error("{manager}: operation {id} belongs to action {owner}, expected {expected}")]
    ForeignOperation {
        manager: &'static str,
        id: Uuid,
        owner: Uuid,
        expected: Uuid,
    },

    #[error("{manager}: action {id} is no longer available")]
    ActionDropped { manager: &'static str, id: Uuid },

    #[error("{manager}: failed to record {entity} {id}: {source}")]
    Record {
        manager: &'static str,
        entity: EntityKind,
        id: Uuid,
        #[source]
        source: RecordError,
    },

    #[error("{manager}: failed to create logger: {source}")]
    Logger {
        manager: &'static str,
        entity: EntityKind,
        #[source]
        source: FactoryError,
    },

    #[error("{manager}: failed to log {entity} {id}: {source}")]
    Logging {
        manager: &'static str,
        entity: EntityKind,
        id: Uuid,
        #[source]
        source: LoggingError,
    },
}

impl ActionsError {
    pub fn manager(&self) -> &'static str {
        match self {
            ActionsError::NotAllowedToCreate { manager, .. }
            | ActionsError::IdGeneration { manager, .. }
            | ActionsError::Lifecycle { manager, .. }
            | ActionsError::TransactionNotStarted { manager, .. }
            | ActionsError::ForeignTransaction { manager, .. }
            | ActionsError::ForeignAction { manager, .. }
            | ActionsError::ForeignOperation { manager, .. }
            | ActionsError::ActionDropped { manager, .. }
            | ActionsError::Record { manager, .. }
            | ActionsError::Logger { manager, .. }
            | ActionsError::Logging { manager, .. } => *manager,
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            ActionsError::NotAllowedToCreate { entity, .. }
            | ActionsError::IdGeneration { entity, .. }
            | ActionsError::Lifecycle { entity, .. }
            | ActionsError::Record { entity, .. }
            | ActionsError::Logger { entity, .. }
            | ActionsError::Logging { entity, .. } => *entity,
            ActionsError::TransactionNotStarted { .. } | ActionsError::ForeignTransaction { .. } => {
                EntityKind::Transaction
            }
            ActionsError::ForeignAction { .. } | ActionsError::ActionDropped { .. } => {
                EntityKind::Action
            }
            ActionsError::ForeignOperation { .. } => EntityKind::Operation,
        }
    }

    /// True when the manager's gate rejected the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, ActionsError::NotAllowedToCreate { .. })
    }
}

impl From<&ActionsError> for EntryError {
    fn from(err: &ActionsError) -> Self {
        let code = match err {
            ActionsError::Logging { .. } | ActionsError::Logger { .. } => ErrorCode::INTERNAL,
            _ => match err.entity() {
                EntityKind::Transaction => ErrorCode::TRANSACTION,
                EntityKind::Action => ErrorCode::ACTION,
                EntityKind::Operation => ErrorCode::OPERATION,
            },
        };
        EntryError::Internal(PlatformError::new(code, err.to_string()))
    }
}

impl From<ActionsError> for EntryError {
    fn from(err: ActionsError) -> Self {
        EntryError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_logging::ErrorCategory;

    #[test]
    fn test_rejection_message_names_manager() {
        let err = ActionsError::NotAllowedToCreate {
            manager: "ActionManager",
            entity: EntityKind::Action,
        };
        assert_eq!(err.to_string(), "ActionManager: not allowed to create actions");
        assert!(err.is_rejected());
        assert_eq!(err.manager(), "ActionManager");
    }

    #[test]
    fn test_lifecycle_message() {
        let id = Uuid::from_u64_pair(1, 2);
        let err = ActionsError::Lifecycle {
            manager: "OperationManager",
            entity: EntityKind::Operation,
            id,
            source: LifecycleError::AlreadyCompleted,
        };
        assert_eq!(
            err.to_string(),
            format!("OperationManager: operation {id} has already been completed")
        );
    }

    #[test]
    fn test_entry_error_codes_follow_entity() {
        let err = ActionsError::TransactionNotStarted {
            manager: "ActionManager",
            id: Uuid::nil(),
        };
        let entry: EntryError = (&err).into();
        assert_eq!(entry.category(), ErrorCategory::Internal);
        assert_eq!(entry.code(), ErrorCode::TRANSACTION);

        let err = ActionsError::ForeignOperation {
            manager: "OperationManager",
            id: Uuid::nil(),
            owner: Uuid::nil(),
            expected: Uuid::max(),
        };
        assert_eq!(EntryError::from(err).code(), ErrorCode::OPERATION);
    }
}
