//! Domain events
//!
//! Registry change-feed events and the telemetry event model.

pub mod registry_events;
pub mod telemetry;

pub use registry_events::{RegistryChange, RegistryEvent};
pub use telemetry::{TelemetryEvent, TelemetryEventKind};
