//! Status state machine shared by actions and operations.
//!
//! `Created -> Running -> {Succeeded, Failed}`. Transitions are atomic
//! compare-and-swaps; timestamps are written once through `OnceLock`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::Status;

/// Completion is in progress: the winner is stamping the end time.
const COMPLETING: u8 = 0xF0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("has already been started")]
    AlreadyStarted,
    #[error("has not been started")]
    NotStarted,
    #[error("has already been completed")]
    AlreadyCompleted,
}

/// End time and elapsed duration, stamped exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub end_time: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    status: AtomicU8,
    created_at: DateTime<Utc>,
    start_time: OnceLock<DateTime<Utc>>,
    completion: OnceLock<Completion>,
}

impl Lifecycle {
    pub(crate) fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            status: AtomicU8::new(Status::Created as u8),
            created_at,
            start_time: OnceLock::new(),
            completion: OnceLock::new(),
        }
    }

    pub(crate) fn status(&self) -> Status {
        match self.status.load(Ordering::Acquire) {
            1 => Status::Created,
            3 => Status::Succeeded,
            4 => Status::Failed,
            // Running, or completing but not yet stamped
            _ => Status::Running,
        }
    }

    pub(crate) fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.get().copied()
    }

    pub(crate) fn completion(&self) -> Option<Completion> {
        self.completion.get().copied()
    }

    pub(crate) fn start(&self) -> Result<DateTime<Utc>, LifecycleError> {
        self.status
            .compare_exchange(
                Status::Created as u8,
                Status::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| match current {
                3 | 4 | COMPLETING => LifecycleError::AlreadyCompleted,
                _ => LifecycleError::AlreadyStarted,
            })?;

        let now = Utc::now();
        Ok(*self.start_time.get_or_init(|| now))
    }

    /// Fails unless the entity is currently running.
    pub(crate) fn ensure_running(&self) -> Result<(), LifecycleError> {
        match self.status.load(Ordering::Acquire) {
            2 => Ok(()),
            1 => Err(LifecycleError::NotStarted),
            _ => Err(LifecycleError::AlreadyCompleted),
        }
    }

    pub(crate) fn complete(&self, succeeded: bool) -> Result<Completion, LifecycleError> {
        self.status
            .compare_exchange(
                Status::Running as u8,
                COMPLETING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| match current {
                1 => LifecycleError::NotStarted,
                _ => LifecycleError::AlreadyCompleted,
            })?;

        let end_time = Utc::now();
        let start = self.start_time().unwrap_or(end_time);
        let elapsed = (end_time - start).to_std().unwrap_or(Duration::ZERO);
        let completion = *self.completion.get_or_init(|| Completion { end_time, elapsed });

        let terminal = if succeeded {
            Status::Succeeded
        } else {
            Status::Failed
        };
        self.status.store(terminal as u8, Ordering::Release);
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let lifecycle = Lifecycle::new(Utc::now());
        assert_eq!(lifecycle.status(), Status::Created);
        assert!(lifecycle.start_time().is_none());

        let started = lifecycle.start().unwrap();
        assert_eq!(lifecycle.status(), Status::Running);
        assert_eq!(lifecycle.start_time(), Some(started));

        let completion = lifecycle.complete(true).unwrap();
        assert_eq!(lifecycle.status(), Status::Succeeded);
        assert!(completion.end_time >= started);
        assert_eq!(lifecycle.completion(), Some(completion));
    }

    #[test]
    fn test_complete_before_start() {
        let lifecycle = Lifecycle::new(Utc::now());
        assert_eq!(lifecycle.complete(true), Err(LifecycleError::NotStarted));
        assert_eq!(lifecycle.ensure_running(), Err(LifecycleError::NotStarted));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let lifecycle = Lifecycle::new(Utc::now());
        lifecycle.start().unwrap();
        let first = lifecycle.complete(false).unwrap();

        assert_eq!(lifecycle.complete(true), Err(LifecycleError::AlreadyCompleted));
        assert_eq!(lifecycle.start(), Err(LifecycleError::AlreadyCompleted));
        assert_eq!(lifecycle.status(), Status::Failed);
        assert_eq!(lifecycle.completion(), Some(first));
    }

    #[test]
    fn test_double_start() {
        let lifecycle = Lifecycle::new(Utc::now());
        lifecycle.start().unwrap();
        assert_eq!(lifecycle.start(), Err(LifecycleError::AlreadyStarted));
    }
}
