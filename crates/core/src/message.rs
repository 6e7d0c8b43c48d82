use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// How long a message stays deliverable on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeToLive {
    /// The message never expires (the transport default).
    #[default]
    Infinite,
    /// The message expires after the given duration.
    Bounded(Duration),
}

impl TimeToLive {
    /// Compute the expiry instant for a message that became live at `now`.
    ///
    /// Returns `None` for [`TimeToLive::Infinite`] and for bounded
    /// durations too large to represent as a timestamp offset.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Infinite => None,
            Self::Bounded(ttl) => chrono::Duration::from_std(*ttl)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta)),
        }
    }
}

/// A bus message as seen by the claim-check pipeline.
///
/// This is the mutable surface the transforms operate on: the transport
/// body, the message identifier, the time-to-live, and the string-keyed
/// application properties that carry the blob reference on the wire.
#[derive(Debug, Clone)]
pub struct Message {
    /// Transport-level message identifier.
    pub message_id: String,
    /// The body handed to the transport.
    pub body: Bytes,
    /// How long the message stays deliverable.
    pub time_to_live: TimeToLive,
    /// String-keyed application properties (opaque scalar values).
    pub properties: HashMap<String, Value>,
}

impl Message {
    /// Create a message with the given body, no identifier, and an
    /// infinite time-to-live.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            message_id: String::new(),
            body: body.into(),
            time_to_live: TimeToLive::Infinite,
            properties: HashMap::new(),
        }
    }

    /// Set the message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Set the time-to-live.
    #[must_use]
    pub fn with_time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    /// Set an application property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Read an application property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}
