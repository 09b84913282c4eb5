//! Events: an append-only record of state transitions on fleetctl objects
//! (spec.md 7: "every state change emits an event on the object (reason
//! string, message, severity)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::ObjectMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// The object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl InvolvedObject {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub metadata: ObjectMeta,
    pub involved_object: InvolvedObject,
    pub reason: String,
    pub message: String,
    pub severity: EventSeverity,
    pub event_time: DateTime<Utc>,
}

impl Event {
    /// Builds a new event, named so repeated events about the same object
    /// do not collide (the name includes a nanosecond timestamp).
    pub fn new(involved_object: InvolvedObject, reason: impl Into<String>, message: impl Into<String>, severity: EventSeverity) -> Self {
        let event_time = Utc::now();
        let name = format!("{}.{:x}", involved_object.name, event_time.timestamp_nanos_opt().unwrap_or_default());
        Self {
            metadata: ObjectMeta::new(involved_object.namespace.clone(), name),
            involved_object,
            reason: reason.into(),
            message: message.into(),
            severity,
            event_time,
        }
    }
}
