use std::sync::OnceLock;

use causeway_logging::{LogEntryContext, TransactionInfo};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::lifecycle::LifecycleError;
use crate::recorder::TransactionRecord;

/// Root of a causal chain. Transactions never nest and are never completed.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    app_session_id: u64,
    created_at: DateTime<Utc>,
    start_time: OnceLock<DateTime<Utc>>,
}

impl Transaction {
    pub(crate) fn new(id: Uuid, app_session_id: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            app_session_id,
            created_at,
            start_time: OnceLock::new(),
        }
    }

    pub(crate) fn start(&self) -> Result<DateTime<Utc>, LifecycleError> {
        let now = Utc::now();
        self.start_time
            .set(now)
            .map_err(|_| LifecycleError::AlreadyStarted)?;
        Ok(now)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn app_session_id(&self) -> u64 {
        self.app_session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.get().copied()
    }

    pub fn is_started(&self) -> bool {
        self.start_time.get().is_some()
    }

    pub fn log_info(&self) -> TransactionInfo {
        TransactionInfo { id: self.id }
    }

    pub fn log_context(&self) -> LogEntryContext {
        LogEntryContext {
            app_session_id: Some(self.app_session_id),
            transaction: Some(self.log_info()),
            ..Default::default()
        }
    }

    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id,
            app_session_id: self.app_session_id,
            created_at: self.created_at,
            start_time: self.start_time(),
        }
    }
}
