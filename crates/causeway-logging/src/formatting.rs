//! Entry formatting shared by the built-in adapters.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::entry::{Field, LogEntry};
use crate::entry_error::{EntryError, ErrorCategory, ErrorCode};
use crate::event::Event;
use crate::level::LogLevel;

/// Identity of the application emitting entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub id: u64,
    pub group_id: u64,
    pub name: String,
    pub version: String,
    pub env: String,
}

/// Identity of the logging library itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            kind: "rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Renders entries as single-line JSON documents.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    app: AppInfo,
    agent: AgentInfo,
    logging_session_id: u64,
}

#[derive(Serialize)]
struct FormattedEntry<'a, C> {
    id: Uuid,
    timestamp: DateTime<Utc>,
    app: &'a AppInfo,
    agent: &'a AgentInfo,
    logging_session_id: u64,
    context: &'a C,
    level: LogLevel,
    category: &'a str,
    event: &'a Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FormattedError<'a>>,
    message: &'a str,
    #[serde(skip_serializing_if = "FieldMap::is_empty")]
    fields: FieldMap<'a>,
}

#[derive(Serialize)]
struct FormattedError<'a> {
    code: ErrorCode,
    message: &'a str,
    category: ErrorCategory,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    type_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backtrace: Option<&'a str>,
}

impl<'a> From<&'a EntryError> for FormattedError<'a> {
    fn from(err: &'a EntryError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
            category: err.category(),
            type_name: err.type_name(),
            backtrace: err.backtrace(),
        }
    }
}

struct FieldMap<'a>(&'a [Field]);

impl FieldMap<'_> {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.key, &field.value)?;
        }
        map.end()
    }
}

impl JsonFormatter {
    pub fn new(app: AppInfo, logging_session_id: u64) -> Self {
        Self {
            app,
            agent: AgentInfo::default(),
            logging_session_id,
        }
    }

    pub fn with_agent(mut self, agent: AgentInfo) -> Self {
        self.agent = agent;
        self
    }

    pub fn format<C: Serialize>(&self, entry: &LogEntry<C>) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.view(entry))
    }

    pub fn to_value<C: Serialize>(
        &self,
        entry: &LogEntry<C>,
    ) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.view(entry))
    }

    fn view<'a, C>(&'a self, entry: &'a LogEntry<C>) -> FormattedEntry<'a, C> {
        FormattedEntry {
            id: entry.id,
            timestamp: entry.timestamp,
            app: &self.app,
            agent: &self.agent,
            logging_session_id: self.logging_session_id,
            context: &entry.context,
            level: entry.level,
            category: &entry.category,
            event: &entry.event,
            error: entry.error.as_ref().map(FormattedError::from),
            message: &entry.message,
            fields: FieldMap(&entry.fields),
        }
    }
}

/// Human-readable single-line rendering used by the console adapter.
pub fn format_text<C: Serialize>(entry: &LogEntry<C>) -> String {
    let mut line = format!(
        "{} {:<7} {}: {}",
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.level.capital_str(),
        entry.category,
        entry.message
    );

    if !entry.event.is_unknown() {
        line.push_str(&format!(" event={}({})", entry.event.name, entry.event.id));
    }
    if let Some(err) = &entry.error {
        line.push_str(&format!(" error=[{}] {}", err.code(), err.message()));
    }
    for field in &entry.fields {
        line.push_str(&format!(" {}={}", field.key, field.value));
    }
    if let Ok(ctx) = serde_json::to_string(&entry.context) {
        if ctx != "null" && ctx != "{}" {
            line.push_str(" ctx=");
            line.push_str(&ctx);
        }
    }
    line
}
