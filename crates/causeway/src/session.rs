//! Application sessions.
//!
//! Each run gets a numeric session id, which prefixes every identifier the
//! loggers and managers mint, and a directory for its log and record files.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one application run. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a random session id.
    pub fn generate() -> Self {
        loop {
            let (high, low) = uuid::Uuid::new_v4().as_u64_pair();
            let id = high ^ low;
            if id != 0 {
                return Self(id);
            }
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Get the session directory path for a given session ID.
pub fn session_dir(causeway_dir: &Path, session_id: &SessionId) -> PathBuf {
    causeway_dir.join("sessions").join(session_id.to_string())
}

/// Metadata about an application session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub app_name: String,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_path: Option<PathBuf>,
}

impl SessionMetadata {
    pub fn new(session_id: SessionId, app_name: &str, app_version: &str) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            app_name: app_name.to_string(),
            app_version: app_version.to_string(),
            log_path: None,
            records_path: None,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_records_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.records_path = Some(path.into());
        self
    }
}

/// Write session metadata to the session directory.
pub fn write_metadata(session_dir: &Path, metadata: &SessionMetadata) -> anyhow::Result<()> {
    let path = session_dir.join("session.json");
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(&path, json)?;
    Ok(())
}

/// Read session metadata from a session directory.
#[cfg_attr(not(test), allow(dead_code))]
pub fn read_metadata(session_dir: &Path) -> anyhow::Result<SessionMetadata> {
    let path = session_dir.join("session.json");
    let json = fs::read_to_string(&path)?;
    let metadata: SessionMetadata = serde_json::from_str(&json)?;
    Ok(metadata)
}
