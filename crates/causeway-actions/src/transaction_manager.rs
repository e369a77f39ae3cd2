use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use causeway_logging::{Event, Field, IdGenerator, LogEntryContext, Logger, LoggerFactory, events};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ActionsError, Result};
use crate::recorder::ActionRecorder;
use crate::transaction::Transaction;
use crate::types::EntityKind;
use crate::wait_group::WaitGroup;

const MANAGER: &str = "TransactionManager";

/// Creates transactions for one application session.
///
/// Transactions are never completed, so [`wait`](Self::wait) only drains
/// creations that were already past the gate when it closed.
pub struct TransactionManager {
    app_session_id: u64,
    ids: IdGenerator,
    logger: Logger<LogEntryContext>,
    recorder: Arc<dyn ActionRecorder>,
    allow_to_create: AtomicBool,
    creating: WaitGroup,
    counter: AtomicU64,
    num_created: AtomicU64,
}

impl TransactionManager {
    pub fn new(
        app_session_id: u64,
        logger_factory: &LoggerFactory<LogEntryContext>,
        recorder: Arc<dyn ActionRecorder>,
    ) -> Result<Self> {
        let logger = logger_factory
            .create_logger("actions.TransactionManager")
            .map_err(|source| ActionsError::Logger {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                source,
            })?;
        let ids = IdGenerator::with_default_concurrency(app_session_id).map_err(|source| {
            ActionsError::IdGeneration {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                source,
            }
        })?;

        Ok(Self {
            app_session_id,
            ids,
            logger,
            recorder,
            allow_to_create: AtomicBool::new(true),
            creating: WaitGroup::new(),
            counter: AtomicU64::new(0),
            num_created: AtomicU64::new(0),
        })
    }

    pub fn app_session_id(&self) -> u64 {
        self.app_session_id
    }

    /// Create a new transaction and start it.
    pub async fn create_and_start(&self) -> Result<Arc<Transaction>> {
        let _registration = self.creating.add();
        self.ensure_allowed()?;

        let id = self.ids.next_id().map_err(|source| {
            self.allow_to_create(false);
            ActionsError::IdGeneration {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                source,
            }
        })?;
        self.counter.fetch_add(1, Ordering::Relaxed);

        let transaction = Transaction::new(id, self.app_session_id, Utc::now());
        self.start(
            transaction,
            events::TRANSACTION_CREATED_AND_STARTED,
            "transaction created and started",
            Vec::new(),
        )
        .await
    }

    /// Start a transaction created by an upstream service.
    pub async fn resume(&self, id: Uuid, created_at: DateTime<Utc>) -> Result<Arc<Transaction>> {
        let _registration = self.creating.add();
        self.ensure_allowed()?;

        let transaction = Transaction::new(id, self.app_session_id, created_at);
        self.start(
            transaction,
            events::TRANSACTION_STARTED,
            "transaction resumed",
            vec![Field::new("created_at", created_at)],
        )
        .await
    }

    fn ensure_allowed(&self) -> Result<()> {
        if self.is_allowed_to_create() {
            Ok(())
        } else {
            Err(ActionsError::NotAllowedToCreate {
                manager: MANAGER,
                entity: EntityKind::Transaction,
            })
        }
    }

    async fn start(
        &self,
        transaction: Transaction,
        event: Event,
        message: &str,
        fields: Vec<Field>,
    ) -> Result<Arc<Transaction>> {
        let id = transaction.id();
        let result = self.announce(&transaction, event, message, fields).await;
        if let Err(err) = result {
            self.allow_to_create(false);
            return Err(err);
        }

        self.num_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(transaction_id = %id, "transaction started");
        Ok(Arc::new(transaction))
    }

    async fn announce(
        &self,
        transaction: &Transaction,
        event: Event,
        message: &str,
        fields: Vec<Field>,
    ) -> Result<()> {
        let id = transaction.id();
        transaction
            .start()
            .map_err(|source| ActionsError::Lifecycle {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                id,
                source,
            })?;

        self.recorder
            .record_transaction(transaction)
            .map_err(|source| ActionsError::Record {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                id,
                source,
            })?;

        self.logger
            .info_with_event(transaction.log_context(), event, message, fields)
            .await
            .map_err(|source| ActionsError::Logging {
                manager: MANAGER,
                entity: EntityKind::Transaction,
                id,
                source,
            })
    }

    pub fn allow_to_create(&self, allow: bool) {
        self.allow_to_create.store(allow, Ordering::SeqCst);
    }

    pub fn is_allowed_to_create(&self) -> bool {
        self.allow_to_create.load(Ordering::SeqCst)
    }

    /// Wait for creations already admitted by the gate.
    pub async fn wait(&self) {
        tracing::debug!(
            pending = self.creating.count(),
            "waiting for transaction creations"
        );
        self.creating.wait().await;
    }

    /// Number of identifiers issued.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn num_created(&self) -> u64 {
        self.num_created.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("app_session_id", &self.app_session_id)
            .field("allow_to_create", &self.is_allowed_to_create())
            .field("num_created", &self.num_created())
            .finish()
    }
}
