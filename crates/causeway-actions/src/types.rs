//! Classification vocabularies and status codes.
//!
//! Types and groups are open `u64` newtypes: the platform defines the
//! shared ranges below and each service adds its own above 10000.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(pub u64);

impl ActionType {
    // Application (1-199)
    pub const APPLICATION_START: ActionType = ActionType(1);
    pub const APPLICATION_STOP: ActionType = ActionType(2);
    pub const APPLICATION_TERMINATE_SESSION: ActionType = ActionType(3);

    // Application session (200-299)
    pub const APPLICATION_SESSION_START: ActionType = ActionType(200);
    pub const APPLICATION_SESSION_TERMINATE: ActionType = ActionType(201);
    pub const APPLICATION_SESSION_HEARTBEAT: ActionType = ActionType(202);

    // Identity (300-499)
    pub const IDENTITY_AUTHENTICATE: ActionType = ActionType(300);
    pub const IDENTITY_AUTHENTICATE_BY_ID: ActionType = ActionType(301);
    pub const IDENTITY_AUTHENTICATE_BY_TOKEN: ActionType = ActionType(302);
    pub const IDENTITY_AUTHORIZE: ActionType = ActionType(303);

    // HTTP server request pipeline (500-549)
    pub const HTTP_SERVER_PIPELINE_AUTHENTICATE: ActionType = ActionType(500);
    pub const HTTP_SERVER_PIPELINE_AUTHORIZE: ActionType = ActionType(501);

    // gRPC server request pipeline (550-599)
    pub const GRPC_SERVER_PIPELINE_AUTHENTICATE: ActionType = ActionType(550);
    pub const GRPC_SERVER_PIPELINE_AUTHORIZE: ActionType = ActionType(551);
}

/// What kind of step an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationType(pub u64);

impl OperationType {
    pub const APPLICATION_START: OperationType = OperationType(1);
    pub const APPLICATION_STOP: OperationType = OperationType(2);
    pub const APPLICATION_TERMINATE_SESSION: OperationType = OperationType(3);

    pub const APPLICATION_SESSION_START: OperationType = OperationType(200);
    pub const APPLICATION_SESSION_TERMINATE: OperationType = OperationType(201);
    pub const APPLICATION_SESSION_HEARTBEAT: OperationType = OperationType(202);

    pub const IDENTITY_MANAGER_AUTHENTICATE: OperationType = OperationType(300);
    pub const IDENTITY_MANAGER_AUTHENTICATE_BY_ID: OperationType = OperationType(301);
    pub const IDENTITY_MANAGER_AUTHENTICATE_BY_TOKEN: OperationType = OperationType(302);
    pub const IDENTITY_MANAGER_AUTHORIZE: OperationType = OperationType(303);

    pub const HTTP_SERVER_PIPELINE_AUTHENTICATE: OperationType = OperationType(500);
    pub const HTTP_SERVER_PIPELINE_AUTHORIZE: OperationType = OperationType(501);

    pub const GRPC_SERVER_PIPELINE_AUTHENTICATE: OperationType = OperationType(550);
    pub const GRPC_SERVER_PIPELINE_AUTHORIZE: OperationType = OperationType(551);

    pub const APPLICATION_CONTROLLER_STOP: OperationType = OperationType(7000);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionGroup(pub u64);

impl ActionGroup {
    pub const NO_GROUP: ActionGroup = ActionGroup(0);
    pub const APPLICATION: ActionGroup = ActionGroup(1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationGroup(pub u64);

impl OperationGroup {
    pub const NO_GROUP: OperationGroup = OperationGroup(0);
    pub const APPLICATION: OperationGroup = OperationGroup(1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ActionCategory {
    Common = 1,
    Http = 2,
    Grpc = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum OperationCategory {
    Common = 1,
    Identity = 2,
    Database = 3,
    CacheStorage = 4,
}

/// Lifecycle status shared by actions and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Status {
    Created = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A named diagnostic value captured when an operation is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParam {
    pub name: String,
    pub value: serde_json::Value,
}

impl OperationParam {
    pub fn new(name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {e}>")));
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Which kind of causality entity an error or record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transaction,
    Action,
    Operation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Transaction => "transaction",
            EntityKind::Action => "action",
            EntityKind::Operation => "operation",
        };
        f.write_str(s)
    }
}
