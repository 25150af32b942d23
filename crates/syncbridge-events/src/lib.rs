//! # Syncbridge Events
//!
//! Inbound change events and outbound telemetry.
//!
//! ```text
//! ┌──────────────┐  from_slice  ┌───────────────┐  into_change_event  ┌─────────────┐
//! │ message body │─────────────►│ EventEnvelope │────────────────────►│ ChangeEvent │
//! └──────────────┘              └───────────────┘                     └─────────────┘
//!
//! ┌──────────────┐    track     ┌───────────────┐
//! │   engine     │─────────────►│ TelemetrySink │──► tracing / memory
//! └──────────────┘              └───────────────┘
//! ```

pub mod envelope;
pub mod error;
pub mod telemetry;

pub use envelope::{ChangeEvent, EventEnvelope, PersonIdentifier, PersonReference};
pub use error::{EventError, EventResult};
pub use telemetry::{
    event_name, RecordingTelemetry, TelemetryAttributes, TelemetryEvent, TelemetrySink,
    TracingTelemetry,
};
