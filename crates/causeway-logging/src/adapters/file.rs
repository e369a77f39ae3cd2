use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::adapter::{AdapterOptions, LogAdapter};
use crate::entry::LogEntry;
use crate::error::AdapterError;
use crate::formatting::JsonFormatter;
use crate::jsonl::{JsonlConfig, JsonlWriter, WriteError};

/// Appends JSON-formatted entries to a session file or daily files.
pub struct FileAdapter<C> {
    writer: JsonlWriter,
    formatter: JsonFormatter,
    options: AdapterOptions<C>,
    disposed: AtomicBool,
}

impl<C> FileAdapter<C> {
    pub fn new(
        config: JsonlConfig,
        formatter: JsonFormatter,
        options: AdapterOptions<C>,
    ) -> Result<Self, AdapterError> {
        let writer = JsonlWriter::new(config).map_err(AdapterError::from)?;
        Ok(Self {
            writer,
            formatter,
            options,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn writer(&self) -> &JsonlWriter {
        &self.writer
    }
}

impl From<WriteError> for AdapterError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Io(e) => AdapterError::Io(e),
            WriteError::Serialization(e) => AdapterError::Serialization(e),
            WriteError::Closed => AdapterError::Disposed("file".to_string()),
        }
    }
}

#[async_trait]
impl<C> LogAdapter<C> for FileAdapter<C>
where
    C: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        "file"
    }

    async fn write(&self, entry: &LogEntry<C>) -> Result<(), AdapterError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(AdapterError::Disposed(self.name().to_string()));
        }
        if !self.options.is_enabled(entry) {
            return Ok(());
        }

        let line = self.formatter.format(entry)?;
        self.writer.write_line(&line)?;
        Ok(())
    }

    fn dispose(&self) -> Result<(), AdapterError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.writer.close()?;
        Ok(())
    }
}
