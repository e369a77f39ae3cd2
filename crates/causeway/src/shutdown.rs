//! Application stop requests.

use std::sync::Arc;

use causeway_actions::StopHandle;
use tokio::sync::watch;

/// Shared handle used to ask the application to stop.
///
/// Constructed once at startup and passed to whatever may need to trigger
/// a stop, such as the logging error handler or the executors.
#[derive(Debug, Clone)]
pub struct Shutdowner {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdowner {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request_stop(&self) {
        let changed = self.tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if changed {
            tracing::info!("Application stop requested");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so wait_for only fails if it is dropped
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdowner {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle for Shutdowner {
    fn request_stop(&self) {
        Shutdowner::request_stop(self);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_stop_wakes_waiters_once() {
        let shutdowner = Shutdowner::new();
        let waiter = {
            let shutdowner = shutdowner.clone();
            tokio::spawn(async move { shutdowner.stopped().await })
        };

        assert!(!shutdowner.is_stop_requested());
        shutdowner.request_stop();
        shutdowner.request_stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdowner.is_stop_requested());

        // already stopped resolves immediately
        tokio::time::timeout(Duration::from_secs(1), shutdowner.stopped())
            .await
            .unwrap();
    }
}
