//! Audit records of transaction, action and operation lifecycles.
//!
//! Alongside their log lines, the managers hand every creation and
//! completion to an [`ActionRecorder`]. The JSONL recorder writes one
//! tagged [`Record`] per line so a session's causal history can be
//! reloaded later.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use causeway_logging::{JsonlConfig, JsonlWriter, WriteError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::action::Action;
use crate::operation::Operation;
use crate::transaction::Transaction;
use crate::types::{
    ActionCategory, ActionGroup, ActionType, OperationCategory, OperationGroup, OperationParam,
    OperationType, Status,
};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("recorder has been disposed")]
    Disposed,

    #[error("failed to write record: {0}")]
    Write(#[from] WriteError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub app_session_id: u64,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub app_session_id: u64,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub category: ActionCategory,
    pub group: ActionGroup,
    pub parent_action_id: Option<Uuid>,
    pub is_background: bool,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub action_id: Uuid,
    pub transaction_id: Uuid,
    pub app_session_id: u64,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub category: OperationCategory,
    pub group: OperationGroup,
    pub parent_operation_id: Option<Uuid>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<OperationParam>,
}

/// One line of the record stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Transaction(TransactionRecord),
    Action(ActionRecord),
    Operation(OperationRecord),
}

/// Sink for lifecycle records.
pub trait ActionRecorder: Send + Sync {
    fn record_transaction(&self, transaction: &Transaction) -> Result<(), RecordError>;

    fn record_action(&self, action: &Action) -> Result<(), RecordError>;

    fn record_operation(&self, operation: &Operation) -> Result<(), RecordError>;

    fn dispose(&self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// Recorder that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl ActionRecorder for NoopRecorder {
    fn record_transaction(&self, _transaction: &Transaction) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_action(&self, _action: &Action) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_operation(&self, _operation: &Operation) -> Result<(), RecordError> {
        Ok(())
    }
}

/// Recorder appending [`Record`] lines through a [`JsonlWriter`].
#[derive(Debug)]
pub struct JsonlRecorder {
    writer: JsonlWriter,
    disposed: AtomicBool,
}

impl JsonlRecorder {
    pub fn new(config: JsonlConfig) -> Result<Self, RecordError> {
        Ok(Self {
            writer: JsonlWriter::new(config)?,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn writer(&self) -> &JsonlWriter {
        &self.writer
    }

    /// Load every record from a file written by this recorder.
    pub fn read_records(path: &Path) -> Result<Vec<Record>, RecordError> {
        Ok(JsonlWriter::read_lines(path)?)
    }

    fn write(&self, record: &Record) -> Result<(), RecordError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(RecordError::Disposed);
        }
        self.writer.write(record)?;
        Ok(())
    }
}

impl ActionRecorder for JsonlRecorder {
    fn record_transaction(&self, transaction: &Transaction) -> Result<(), RecordError> {
        self.write(&Record::Transaction(transaction.to_record()))
    }

    fn record_action(&self, action: &Action) -> Result<(), RecordError> {
        self.write(&Record::Action(action.to_record()))
    }

    fn record_operation(&self, operation: &Operation) -> Result<(), RecordError> {
        self.write(&Record::Operation(operation.to_record()))
    }

    fn dispose(&self) -> Result<(), RecordError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.writer.close()?;
        Ok(())
    }
}
