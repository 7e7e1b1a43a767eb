//! Shared models and types
//!
//! Wire shapes consumed by the dashboard layer. Events and alerts are
//! immutable once constructed; confidence is clamped into 0..=100 at
//! construction so no out-of-range value ever reaches a log.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub inference_connected: bool,
}

/// Three-level severity attached to every event/alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Suspicious,
}

/// Security-relevant event produced by the detection pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
    pub location: String,
    pub time: String,
    pub status: Severity,
    pub confidence: u8,
}

impl Event {
    /// Build a new event with a fresh short id and second-precision timestamp
    pub fn new(
        event_type: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        status: Severity,
        confidence: f32,
    ) -> Self {
        Self {
            id: short_id(),
            event_type: event_type.into(),
            description: description.into(),
            location: location.into(),
            time: now_iso(),
            status,
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Missing-person match alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub name: String,
    pub age: u32,
    pub person_id: i64,
    pub confidence: u8,
    pub time: String,
    pub status: Severity,
}

impl Alert {
    pub const TYPE: &'static str = "Missing Person Detected";

    pub fn new(name: impl Into<String>, age: u32, person_id: i64, confidence: f32) -> Self {
        Self {
            id: short_id(),
            alert_type: Self::TYPE.to_string(),
            name: name.into(),
            age,
            person_id,
            confidence: clamp_confidence(confidence),
            time: now_iso(),
            status: Severity::Suspicious,
        }
    }

    /// Mirror this alert as an event for the merged dashboard feed
    pub fn to_event(&self) -> Event {
        Event {
            id: short_id(),
            event_type: self.alert_type.clone(),
            description: format!("Match for registered person '{}'", self.name),
            location: "Unknown".to_string(),
            time: self.time.clone(),
            status: Severity::Suspicious,
            confidence: self.confidence,
        }
    }
}

/// Second-precision local timestamp, dashboard display format
fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Short random id (uuid v4 truncated to 8 hex chars)
fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn clamp_confidence(confidence: f32) -> u8 {
    confidence.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        let evt = Event::new("Test", "d", "Zone A", Severity::Normal, 150.0);
        assert_eq!(evt.confidence, 100);

        let evt = Event::new("Test", "d", "Zone A", Severity::Normal, -5.0);
        assert_eq!(evt.confidence, 0);

        let evt = Event::new("Test", "d", "Zone A", Severity::Normal, 72.4);
        assert_eq!(evt.confidence, 72);
    }

    #[test]
    fn test_event_ids_unique() {
        let a = Event::new("Test", "d", "Zone A", Severity::Normal, 50.0);
        let b = Event::new("Test", "d", "Zone A", Severity::Normal, 50.0);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 8);
    }

    #[test]
    fn test_alert_mirrors_as_event() {
        let alert = Alert::new("Jane Doe", 34, 7, 88.0);
        assert_eq!(alert.alert_type, Alert::TYPE);
        assert_eq!(alert.status, Severity::Suspicious);

        let evt = alert.to_event();
        assert_eq!(evt.event_type, Alert::TYPE);
        assert_eq!(evt.status, Severity::Suspicious);
        assert_eq!(evt.confidence, alert.confidence);
        assert_eq!(evt.time, alert.time);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Suspicious).unwrap(),
            "\"suspicious\""
        );
    }
}
