//! Event trace recording.
//!
//! When enabled via [`SimulationConfig`](crate::SimulationConfig), the
//! simulation records one [`TraceEntry`] per processed event, in processing
//! order. Traces are plain serializable data: compare two of them to assert
//! deterministic replay, or dump them as JSON for external analysis and
//! plotting.

use serde::Serialize;

use crate::event::{Event, EventId};

/// One processed event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TraceEntry {
    /// Position in the processing order, starting at 0.
    pub order: u64,
    /// Simulation time the event was processed at.
    pub time: f64,
    /// Identifier of the event.
    pub event_id: EventId,
    /// Kind of event, e.g. `"timeout"` or `"resource.request"`.
    pub label: &'static str,
    /// Type name of the payload, if any.
    pub data_type: Option<String>,
    /// Payload serialized to JSON, if any.
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub(crate) fn for_event(order: u64, time: f64, event: &Event) -> Self {
        let value = event.value();
        let (data_type, data) = match &value {
            Some(data) => (
                serde_type_name::type_name(data)
                    .ok()
                    .map(|name| name.to_string()),
                serde_json::to_value(&**data).ok(),
            ),
            None => (None, None),
        };
        Self {
            order,
            time,
            event_id: event.id(),
            label: event.label(),
            data_type,
            data,
        }
    }
}
