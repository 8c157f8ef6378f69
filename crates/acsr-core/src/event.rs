//! Alarm events and notification batches.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A single event reported by the alarm panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Event category (e.g. "motion", "burglary")
    #[serde(rename = "type")]
    pub event_type: String,

    /// Human-readable detail (zone name, user, ...)
    pub description: String,

    /// Sortable ISO-8601 timestamp text
    pub timestamp: String,
}

impl AlarmEvent {
    /// Creates an event with an explicit timestamp.
    pub fn new(
        event_type: impl Into<String>,
        description: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            description: description.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Creates an event stamped with the current UTC time.
    pub fn now(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            event_type,
            description,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    /// Body line for this event: `"<type>: <description>"`.
    pub fn line(&self) -> String {
        format!("{}: {}", self.event_type, self.description)
    }
}

/// Ordered group of events sent as one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    events: Vec<AlarmEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: AlarmEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[AlarmEvent] {
        &self.events
    }

    /// Header of the composed message: the first event's timestamp.
    pub fn header(&self) -> Option<&str> {
        self.events.first().map(|e| e.timestamp.as_str())
    }

    /// Composes the notification text.
    ///
    /// Format: `"<first timestamp>:\n<type>: <description>\n..."`, one line
    /// per event in batch order.
    pub fn compose(&self) -> DomainResult<String> {
        let header = self.header().ok_or(DomainError::EmptyBatch)?;
        let lines: Vec<String> = self.events.iter().map(AlarmEvent::line).collect();
        Ok(format!("{}:\n{}", header, lines.join("\n")))
    }
}

impl From<Vec<AlarmEvent>> for EventBatch {
    fn from(events: Vec<AlarmEvent>) -> Self {
        Self { events }
    }
}

impl FromIterator<AlarmEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = AlarmEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_two_events() {
        let batch = EventBatch::from(vec![
            AlarmEvent::new("motion", "Front door", "2024-01-01T00:00:00Z"),
            AlarmEvent::new("motion", "Back door", "2024-01-01T00:05:00Z"),
        ]);

        assert_eq!(
            batch.compose().unwrap(),
            "2024-01-01T00:00:00Z:\nmotion: Front door\nmotion: Back door"
        );
    }

    #[test]
    fn test_compose_uses_first_timestamp_not_earliest() {
        let batch = EventBatch::from(vec![
            AlarmEvent::new("fire", "Kitchen", "2024-06-01T12:00:00Z"),
            AlarmEvent::new("fire", "Hall", "2024-01-01T00:00:00Z"),
        ]);

        assert!(batch.compose().unwrap().starts_with("2024-06-01T12:00:00Z:\n"));
    }

    #[test]
    fn test_compose_single_event() {
        let batch: EventBatch =
            std::iter::once(AlarmEvent::new("panic", "Keypad", "2024-01-01T00:00:00Z")).collect();
        assert_eq!(batch.compose().unwrap(), "2024-01-01T00:00:00Z:\npanic: Keypad");
    }

    #[test]
    fn test_compose_empty_batch() {
        assert_eq!(EventBatch::new().compose(), Err(DomainError::EmptyBatch));
        assert_eq!(EventBatch::new().header(), None);
    }

    #[test]
    fn test_event_json_uses_type_key() {
        let event = AlarmEvent::new("motion", "Garage", "2024-01-01T00:00:00Z");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "motion");
        assert_eq!(json["description"], "Garage");
    }

    #[test]
    fn test_now_timestamp_is_utc_seconds() {
        let event = AlarmEvent::now("motion", "Garage");
        assert!(event.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }
}
