use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterOptions, LogAdapter};
use crate::entry::LogEntry;
use crate::error::AdapterError;
use crate::formatting::{JsonFormatter, format_text};

/// Line format written by [`ConsoleAdapter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    #[default]
    Text,
    Json,
}

/// Writes one line per entry to stdout, or to an injected writer.
pub struct ConsoleAdapter<C> {
    out: Mutex<Box<dyn Write + Send>>,
    format: ConsoleFormat,
    formatter: JsonFormatter,
    options: AdapterOptions<C>,
    disposed: AtomicBool,
}

impl<C> ConsoleAdapter<C> {
    pub fn new(formatter: JsonFormatter, format: ConsoleFormat, options: AdapterOptions<C>) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), formatter, format, options)
    }

    pub fn with_writer(
        out: Box<dyn Write + Send>,
        formatter: JsonFormatter,
        format: ConsoleFormat,
        options: AdapterOptions<C>,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            format,
            formatter,
            options,
            disposed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<C> LogAdapter<C> for ConsoleAdapter<C>
where
    C: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        "console"
    }

    async fn write(&self, entry: &LogEntry<C>) -> Result<(), AdapterError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(AdapterError::Disposed(self.name().to_string()));
        }
        if !self.options.is_enabled(entry) {
            return Ok(());
        }

        let line = match self.format {
            ConsoleFormat::Text => format_text(entry),
            ConsoleFormat::Json => self.formatter.format(entry)?,
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Field;
    use crate::event::Event;
    use crate::formatting::AppInfo;
    use crate::level::LogLevel;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn entry(level: LogLevel) -> LogEntry<()> {
        LogEntry {
            id: Uuid::from_u64_pair(1, 1),
            timestamp: Utc::now(),
            context: (),
            level,
            category: "console.test".to_string(),
            event: Event::UNKNOWN,
            error: None,
            message: "hello".to_string(),
            fields: vec![Field::new("k", "v")],
        }
    }

    #[tokio::test]
    async fn test_json_lines_respect_own_range() {
        let buf = SharedBuf::default();
        let adapter = ConsoleAdapter::with_writer(
            Box::new(buf.clone()),
            JsonFormatter::new(AppInfo::default(), 1),
            ConsoleFormat::Json,
            AdapterOptions::new(LogLevel::Info, LogLevel::Fatal),
        );

        adapter.write(&entry(LogLevel::Debug)).await.unwrap();
        adapter.write(&entry(LogLevel::Warning)).await.unwrap();

        let out = buf.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["level"], "warning");
        assert_eq!(value["fields"]["k"], "v");
    }

    #[tokio::test]
    async fn test_write_after_dispose_fails() {
        let buf = SharedBuf::default();
        let adapter = ConsoleAdapter::with_writer(
            Box::new(buf.clone()),
            JsonFormatter::new(AppInfo::default(), 1),
            ConsoleFormat::Text,
            AdapterOptions::default(),
        );

        adapter.write(&entry(LogLevel::Info)).await.unwrap();
        adapter.dispose().unwrap();
        adapter.dispose().unwrap();

        let err = adapter.write(&entry(LogLevel::Info)).await.unwrap_err();
        assert!(matches!(err, AdapterError::Disposed(_)));
        assert_eq!(buf.contents().lines().count(), 1);
    }
}
