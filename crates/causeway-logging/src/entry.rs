//! Log entries and their free-form fields.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::entry_error::EntryError;
use crate::event::Event;
use crate::level::LogLevel;

/// A named value attached to an entry.
///
/// Values are converted to JSON when the field is built, so entries stay
/// cheap to share between adapter tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: serde_json::Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {e}>")));
        Self {
            key: key.into(),
            value,
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

/// An immutable, correlated log record.
#[derive(Debug, Clone)]
pub struct LogEntry<C> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub context: C,
    pub level: LogLevel,
    pub category: String,
    pub event: Event,
    pub error: Option<EntryError>,
    pub message: String,
    pub fields: Vec<Field>,
}

impl<C> LogEntry<C> {
    /// Look up a field value by key.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}
