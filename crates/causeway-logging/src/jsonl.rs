//! Append-only JSONL persistence.
//!
//! Supports two modes:
//! - **Session mode**: Writes to a single file (e.g., `session_dir/log.jsonl`)
//! - **Daily rotation**: Writes to dated files (e.g., `logs/2026-01-11.jsonl`)

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for JSONL writing operations.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("writer has been closed")]
    Closed,
}

/// Configuration for a [`JsonlWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlConfig {
    /// Session mode: full path to the file. Daily rotation: directory for dated files.
    pub path: PathBuf,

    pub enabled: bool,

    /// Session mode writes to a single file; daily rotation writes to dated files.
    pub session_mode: bool,
}

impl JsonlConfig {
    pub fn session(file: impl Into<PathBuf>) -> Self {
        Self {
            path: file.into(),
            enabled: true,
            session_mode: true,
        }
    }

    pub fn daily_rotation(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into(),
            enabled: true,
            session_mode: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
            session_mode: false,
        }
    }
}

/// Line-oriented JSON writer, safe to share between threads.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    state: Mutex<WriterState>,
}

#[derive(Debug, Default)]
struct WriterState {
    current: Option<CurrentFile>,
    closed: bool,
}

#[derive(Debug)]
struct CurrentFile {
    /// For daily rotation: the date string. For session mode: "session".
    key: String,
    writer: BufWriter<File>,
}

impl JsonlWriter {
    pub fn new(config: JsonlConfig) -> Result<Self, WriteError> {
        if config.enabled {
            if config.session_mode {
                if let Some(parent) = config.path.parent() {
                    fs::create_dir_all(parent)?;
                }
            } else {
                fs::create_dir_all(&config.path)?;
            }
        }

        Ok(Self {
            config,
            state: Mutex::new(WriterState::default()),
        })
    }

    pub fn config(&self) -> &JsonlConfig {
        &self.config
    }

    /// Serialize `value` and append it as one line.
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), WriteError> {
        if !self.config.enabled {
            return Ok(());
        }
        let line = serde_json::to_string(value)?;
        self.write_line(&line)
    }

    /// Append an already-serialized line.
    pub fn write_line(&self, line: &str) -> Result<(), WriteError> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(WriteError::Closed);
        }

        let key = self.current_key();
        let needs_new_file = match &state.current {
            None => true,
            Some(cf) => cf.key != key,
        };
        if needs_new_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for_key(&key))?;
            state.current = Some(CurrentFile {
                key,
                writer: BufWriter::new(file),
            });
        }

        if let Some(cf) = state.current.as_mut() {
            writeln!(cf.writer, "{}", line)?;
            cf.writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release the open file. Later writes fail with [`WriteError::Closed`].
    pub fn close(&self) -> Result<(), WriteError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        if let Some(mut cf) = state.current.take() {
            cf.writer.flush()?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    fn current_key(&self) -> String {
        if self.config.session_mode {
            "session".to_string()
        } else {
            Utc::now().format("%Y-%m-%d").to_string()
        }
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        if self.config.session_mode {
            self.config.path.clone()
        } else {
            self.config.path.join(format!("{}.jsonl", key))
        }
    }

    /// Get the path to the file the next line will go to.
    pub fn current_file_path(&self) -> PathBuf {
        self.path_for_key(&self.current_key())
    }

    /// List every JSONL file this writer owns.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, WriteError> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }

        if self.config.session_mode {
            if self.config.path.exists() {
                return Ok(vec![self.config.path.clone()]);
            }
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.config.path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();

        files.sort();
        Ok(files)
    }

    /// Read every line of a JSONL file.
    pub fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, WriteError> {
        let content = fs::read_to_string(path)?;
        let values: Result<Vec<T>, _> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect();
        Ok(values?)
    }
}
