//! Event types for the Stagehand event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Correlation ID for tracing related events.
    pub correlation_id: Option<Uuid>,
    /// Source component that emitted the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: source.into(),
        }
    }

    /// Set correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// A named event emitted on the bus.
///
/// Event names are free-form strings. The host and its modules agree on
/// names by convention (e.g. `app:before-quit`, `search:indexed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event name.
    pub name: String,
    /// Arbitrary JSON payload. `Value::Null` when the emitter sends none.
    #[serde(default)]
    pub payload: Value,
}

impl HostEvent {
    /// Create an event with the given name and payload.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            metadata: EventMetadata::default(),
            name: name.into(),
            payload,
        }
    }

    /// Replace the event metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this event carries the given name.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_metadata_creation() {
        let meta = EventMetadata::new("host");
        assert_eq!(meta.source, "host");
        assert!(meta.correlation_id.is_none());
    }

    #[test]
    fn test_event_metadata_correlation() {
        let id = Uuid::new_v4();
        let meta = EventMetadata::new("host").with_correlation_id(id);
        assert_eq!(meta.correlation_id, Some(id));
    }

    #[test]
    fn test_host_event_name_matching() {
        let event = HostEvent::new("app:before-quit", Value::Null);
        assert!(event.is("app:before-quit"));
        assert!(!event.is("app:ready"));
    }

    #[test]
    fn test_host_event_serialization() {
        let event = HostEvent::new("search:indexed", serde_json::json!({ "docs": 3 }))
            .with_metadata(EventMetadata::new("search"));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"name\":\"search:indexed\""));

        let parsed: HostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "search:indexed");
        assert_eq!(parsed.payload["docs"], 3);
        assert_eq!(parsed.metadata.source, "search");
    }
}
