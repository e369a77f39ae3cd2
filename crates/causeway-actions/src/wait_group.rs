//! Counting wait group for graceful drain.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts outstanding units of work and wakes waiters when it reaches zero.
///
/// `wait` registers interest before reading the count, so a `done` racing
/// with `wait` cannot slip its final wakeup in between.
#[derive(Debug, Default)]
pub struct WaitGroup {
    count: AtomicUsize,
    notify: Notify,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work. Dropping the guard undoes the registration
    /// unless [`WaitGroupGuard::keep`] is called.
    pub fn add(&self) -> WaitGroupGuard<'_> {
        self.count.fetch_add(1, Ordering::SeqCst);
        WaitGroupGuard {
            group: self,
            armed: true,
        }
    }

    /// Take back one kept registration. Dropping the guard marks the unit
    /// of work as finished.
    pub fn release(&self) -> WaitGroupGuard<'_> {
        WaitGroupGuard {
            group: self,
            armed: true,
        }
    }

    /// Mark one kept unit of work as finished.
    pub fn done(&self) {
        let previous = self.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "WaitGroup::done called more times than add");
        if previous == 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until the count is zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Registration returned by [`WaitGroup::add`].
#[must_use = "dropping the guard immediately releases the registration"]
#[derive(Debug)]
pub struct WaitGroupGuard<'a> {
    group: &'a WaitGroup,
    armed: bool,
}

impl WaitGroupGuard<'_> {
    /// Keep the registration; it is released later by [`WaitGroup::done`].
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for WaitGroupGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.group.done();
        }
    }
}
