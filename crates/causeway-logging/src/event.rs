//! Event classification attached to every log entry.
//!
//! An [`Event`] names *what happened* independently of the message text, so
//! downstream consumers can filter on stable numeric ids. The predefined
//! catalog lives in [`events`].

use serde::Serialize;

/// Broad subsystem an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum EventCategory {
    Unknown = 0,
    Common = 1,
    Configuration = 2,
    Identity = 3,
    Database = 4,
    CacheStorage = 5,
    Network = 6,
}

/// Open set of event groups; applications may define their own ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventGroup(pub u64);

impl EventGroup {
    pub const NO_GROUP: EventGroup = EventGroup(0);
    pub const APPLICATION: EventGroup = EventGroup(1);
    pub const IDENTITY: EventGroup = EventGroup(2);
    pub const TRANSACTION: EventGroup = EventGroup(3);
    pub const ACTION: EventGroup = EventGroup(4);
    pub const OPERATION: EventGroup = EventGroup(5);
    pub const NETWORK: EventGroup = EventGroup(6);
    pub const DATABASE: EventGroup = EventGroup(19);
    pub const CACHING: EventGroup = EventGroup(20);
    pub const WEB: EventGroup = EventGroup(21);
}

/// A classified, named event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Event {
    pub id: u64,
    pub name: &'static str,
    pub category: EventCategory,
    pub group: EventGroup,
}

impl Event {
    /// Sentinel used when a log call does not name an event.
    pub const UNKNOWN: Event = Event::new(0, "", EventCategory::Unknown, EventGroup::NO_GROUP);

    pub const fn new(
        id: u64,
        name: &'static str,
        category: EventCategory,
        group: EventGroup,
    ) -> Self {
        Self {
            id,
            name,
            category,
            group,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Event::UNKNOWN
    }
}

impl Default for Event {
    fn default() -> Self {
        Event::UNKNOWN
    }
}

/// Predefined events emitted by the platform itself.
pub mod events {
    use super::{Event, EventCategory, EventGroup};

    // Application
    pub const APPLICATION: Event =
        Event::new(0, "Application", EventCategory::Common, EventGroup::APPLICATION);
    pub const APPLICATION_IS_STARTING: Event = Event::new(
        1,
        "ApplicationIsStarting",
        EventCategory::Common,
        EventGroup::APPLICATION,
    );
    pub const APPLICATION_STARTED: Event = Event::new(
        2,
        "ApplicationStarted",
        EventCategory::Common,
        EventGroup::APPLICATION,
    );
    pub const APPLICATION_IS_STOPPING: Event = Event::new(
        3,
        "ApplicationIsStopping",
        EventCategory::Common,
        EventGroup::APPLICATION,
    );
    pub const APPLICATION_STOPPED: Event = Event::new(
        4,
        "ApplicationStopped",
        EventCategory::Common,
        EventGroup::APPLICATION,
    );

    // Transaction
    pub const TRANSACTION: Event =
        Event::new(0, "Transaction", EventCategory::Common, EventGroup::TRANSACTION);
    pub const TRANSACTION_CREATED: Event = Event::new(
        1200,
        "TransactionCreated",
        EventCategory::Common,
        EventGroup::TRANSACTION,
    );
    pub const TRANSACTION_STARTED: Event = Event::new(
        1201,
        "TransactionStarted",
        EventCategory::Common,
        EventGroup::TRANSACTION,
    );
    pub const TRANSACTION_CREATED_AND_STARTED: Event = Event::new(
        1202,
        "TransactionCreatedAndStarted",
        EventCategory::Common,
        EventGroup::TRANSACTION,
    );

    // Action
    pub const ACTION: Event = Event::new(0, "Action", EventCategory::Common, EventGroup::ACTION);
    pub const ACTION_CREATED: Event =
        Event::new(1300, "ActionCreated", EventCategory::Common, EventGroup::ACTION);
    pub const ACTION_STARTED: Event =
        Event::new(1301, "ActionStarted", EventCategory::Common, EventGroup::ACTION);
    pub const ACTION_CREATED_AND_STARTED: Event = Event::new(
        1302,
        "ActionCreatedAndStarted",
        EventCategory::Common,
        EventGroup::ACTION,
    );
    pub const ACTION_COMPLETED: Event =
        Event::new(1303, "ActionCompleted", EventCategory::Common, EventGroup::ACTION);

    // Operation
    pub const OPERATION: Event =
        Event::new(0, "Operation", EventCategory::Common, EventGroup::OPERATION);
    pub const OPERATION_CREATED: Event = Event::new(
        1400,
        "OperationCreated",
        EventCategory::Common,
        EventGroup::OPERATION,
    );
    pub const OPERATION_STARTED: Event = Event::new(
        1401,
        "OperationStarted",
        EventCategory::Common,
        EventGroup::OPERATION,
    );
    pub const OPERATION_CREATED_AND_STARTED: Event = Event::new(
        1402,
        "OperationCreatedAndStarted",
        EventCategory::Common,
        EventGroup::OPERATION,
    );
    pub const OPERATION_COMPLETED: Event = Event::new(
        1403,
        "OperationCompleted",
        EventCategory::Common,
        EventGroup::OPERATION,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        let event = Event::default();
        assert!(event.is_unknown());
        assert_eq!(event.category, EventCategory::Unknown);
        assert_eq!(event.group, EventGroup::NO_GROUP);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(events::ACTION_COMPLETED).unwrap();
        assert_eq!(json["id"], 1303);
        assert_eq!(json["name"], "ActionCompleted");
        assert_eq!(json["category"], "common");
        assert_eq!(json["group"], 4);
    }
}
