//! Raw inbound events.

use serde_json::Value;

/// A single event surfaced by a lounge subscription.
///
/// The payload is kept untyped here; consumers decode the fields they need.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Event name, e.g. `nowPlaying` or `onAdStateChange`
    pub name: String,
    /// Event payload, `Value::Null` when the event carried none
    pub payload: Value,
}

impl RawEvent {
    /// Create a new event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Get a string field from the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}
