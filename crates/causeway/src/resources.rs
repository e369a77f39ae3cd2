//! Ordered release of acquired resources.
//!
//! Startup pushes a release step for every resource it acquires. Both a
//! failed startup and a normal stop unwind the same stack, newest first.

use futures::future::BoxFuture;

type Release = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Release steps in acquisition order.
#[derive(Default)]
pub struct ResourceStack {
    entries: Vec<(&'static str, Release)>,
}

impl ResourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the release step of a resource that was just acquired.
    pub fn push<F>(&mut self, name: &'static str, release: F)
    where
        F: FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.entries.push((name, Box::new(release)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every release step, newest first.
    ///
    /// A failing step is logged and does not stop the unwind. Returns the
    /// names of the steps that failed.
    pub async fn unwind(&mut self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        while let Some((name, release)) = self.entries.pop() {
            tracing::debug!("Releasing {}", name);
            if let Err(e) = release().await {
                tracing::error!("Failed to release {}: {:#}", name, e);
                failed.push(name);
            }
        }
        failed
    }
}

impl std::fmt::Debug for ResourceStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ResourceStack").field("entries", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn test_unwind_runs_in_reverse_and_continues_past_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::new();

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            stack.push(name, move || {
                async move {
                    order.lock().unwrap().push(name);
                    if name == "second" {
                        anyhow::bail!("second failed");
                    }
                    Ok(())
                }
                .boxed()
            });
        }
        assert_eq!(stack.len(), 3);

        let failed = stack.unwind().await;
        assert_eq!(failed, vec!["second"]);
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(stack.is_empty());

        // a second unwind has nothing left to release
        assert!(stack.unwind().await.is_empty());
    }
}
