//! Outcome telemetry.
//!
//! Events are named `{family}-{action}-{outcome}` and carry a flat
//! string-to-string attribute map. Sinks are append-only and order-insensitive.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

/// Flat attribute map attached to every telemetry event.
pub type TelemetryAttributes = BTreeMap<String, String>;

/// Build a `{family}-{action}-{outcome}` event name.
#[must_use]
pub fn event_name(family: &str, action: &str, outcome: &str) -> String {
    format!("{family}-{action}-{outcome}")
}

/// A single named telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub attributes: TelemetryAttributes,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: TelemetryAttributes::new(),
        }
    }

    /// Add an attribute. Values are stringified.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    /// Add an attribute only when a value is present.
    #[must_use]
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Merge a set of attributes. Existing keys are overwritten.
    #[must_use]
    pub fn with_attributes(mut self, attributes: &TelemetryAttributes) -> Self {
        self.attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Destination for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: TelemetryEvent);
}

/// Sink that forwards events to `tracing` under the `telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track(&self, event: TelemetryEvent) {
        let attributes = serde_json::to_string(&event.attributes).unwrap_or_default();
        info!(
            target: "telemetry",
            event = %event.name,
            attributes = %attributes,
            "Telemetry event"
        );
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events with the given name.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// Number of events with the given name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.named(name).len()
    }

    /// Names of all events in arrival order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn track(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
