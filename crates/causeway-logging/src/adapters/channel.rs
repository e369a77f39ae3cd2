use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::adapter::{AdapterOptions, LogAdapter};
use crate::entry::LogEntry;
use crate::error::AdapterError;
use crate::formatting::JsonFormatter;

/// Publishes JSON-formatted entries onto a bounded queue.
///
/// The receiving half is handed to whatever forwards entries off-process.
/// Writers wait for capacity when the queue is full. Disposing drops the
/// sender, so the consumer sees the queue end once it has drained.
pub struct ChannelAdapter<C> {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    formatter: JsonFormatter,
    options: AdapterOptions<C>,
}

impl<C> ChannelAdapter<C> {
    pub fn new(
        capacity: usize,
        formatter: JsonFormatter,
        options: AdapterOptions<C>,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let adapter = Self {
            sender: Mutex::new(Some(tx)),
            formatter,
            options,
        };
        (adapter, rx)
    }

    fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl<C> LogAdapter<C> for ChannelAdapter<C>
where
    C: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        "channel"
    }

    async fn write(&self, entry: &LogEntry<C>) -> Result<(), AdapterError> {
        let Some(sender) = self.sender() else {
            return Err(AdapterError::Disposed(self.name().to_string()));
        };
        if !self.options.is_enabled(entry) {
            return Ok(());
        }

        let line = self.formatter.format(entry)?;
        sender
            .send(line)
            .await
            .map_err(|_| AdapterError::ChannelClosed)
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::formatting::AppInfo;
    use crate::level::LogLevel;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(message: &str) -> LogEntry<()> {
        LogEntry {
            id: Uuid::from_u64_pair(4, 2),
            timestamp: Utc::now(),
            context: (),
            level: LogLevel::Error,
            category: "queue.test".to_string(),
            event: Event::UNKNOWN,
            error: None,
            message: message.to_string(),
            fields: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_entries_are_queued_then_stream_ends() {
        let (adapter, mut rx) =
            ChannelAdapter::new(4, JsonFormatter::new(AppInfo::default(), 4), AdapterOptions::default());

        adapter.write(&entry("queued")).await.unwrap();
        adapter.dispose().unwrap();

        let line = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"], "queued");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_consumer_is_a_write_error() {
        let (adapter, rx) =
            ChannelAdapter::new(1, JsonFormatter::new(AppInfo::default(), 4), AdapterOptions::default());
        drop(rx);

        let err = adapter.write(&entry("lost")).await.unwrap_err();
        assert!(matches!(err, AdapterError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_write_after_dispose() {
        let (adapter, _rx) =
            ChannelAdapter::<()>::new(1, JsonFormatter::new(AppInfo::default(), 4), AdapterOptions::default());
        adapter.dispose().unwrap();
        let err = adapter.write(&entry("late")).await.unwrap_err();
        assert!(matches!(err, AdapterError::Disposed(_)));
    }
}
