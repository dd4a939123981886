/// Trace event model
///
/// Read-only input consumed by the detectors: a transaction event and its
/// ordered child spans.
pub mod structs;

pub use structs::{millis_to_delta, saturating_add, seconds_to_delta, Event, Measurement, Span};
