//! The standard correlation context for log entries.
//!
//! Loggers are generic over their context type; this is the shape the
//! causality managers project an operation context into.

use serde::Serialize;
use uuid::Uuid;

use crate::entry::Field;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogEntryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_session_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl LogEntryContext {
    pub fn for_session(app_session_id: u64) -> Self {
        Self {
            app_session_id: Some(app_session_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionInfo {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: u64,
    pub category: u16,
    pub group: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub operation_type: u64,
    pub category: u16,
    pub group: u64,
}
