use chrono::Duration;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::common::constants::{
    FCP_MEASUREMENT, MAX_TIME_SECONDS, MICROSECONDS_PER_MILLISECOND, MICROSECONDS_PER_SECOND,
};

/// Scale to microseconds and clamp to +/- `MAX_TIME_SECONDS`, so the difference
/// or sum of two converted values always fits. NaN becomes zero.
fn clamped_microseconds(value: f64, scale: f64) -> Duration {
    let bound = MAX_TIME_SECONDS * MICROSECONDS_PER_SECOND;
    Duration::microseconds((value * scale).round().clamp(-bound, bound) as i64)
}

/// Convert float seconds since epoch into a microsecond-precision time delta
pub fn seconds_to_delta(seconds: f64) -> Duration {
    clamped_microseconds(seconds, MICROSECONDS_PER_SECOND)
}

/// Convert a millisecond threshold into a microsecond-precision time delta
pub fn millis_to_delta(millis: f64) -> Duration {
    clamped_microseconds(millis, MICROSECONDS_PER_MILLISECOND)
}

/// Accumulate durations, pinning to the representable range instead of overflowing
pub fn saturating_add(total: Duration, delta: Duration) -> Duration {
    total.checked_add(&delta).unwrap_or_else(|| {
        if delta < Duration::zero() {
            Duration::min_value()
        } else {
            Duration::max_value()
        }
    })
}

/// A single timed operation within a trace.
///
/// Every field is optional on the wire; detectors decide for themselves which
/// fields they require. Unknown fields are ignored during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Structural grouping key computed upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
    /// End of the span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Span {
    pub fn new(span_id: &str, op: &str, start_timestamp: f64, timestamp: f64) -> Self {
        Self {
            span_id: Some(span_id.to_string()),
            op: Some(op.to_string()),
            start_timestamp: Some(start_timestamp),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    pub fn with_parent(mut self, parent_span_id: &str) -> Self {
        self.parent_span_id = Some(parent_span_id.to_string());
        self
    }

    pub fn span_id(&self) -> Option<&str> {
        non_empty(&self.span_id)
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        non_empty(&self.parent_span_id)
    }

    pub fn op(&self) -> Option<&str> {
        non_empty(&self.op)
    }

    pub fn description(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    pub fn hash(&self) -> Option<&str> {
        non_empty(&self.hash)
    }

    /// Start time as a delta since epoch, zero when missing
    pub fn start(&self) -> Duration {
        seconds_to_delta(self.start_timestamp.unwrap_or(0.0))
    }

    /// End time as a delta since epoch, zero when missing
    pub fn end(&self) -> Duration {
        seconds_to_delta(self.timestamp.unwrap_or(0.0))
    }

    /// Signed span duration. Missing timestamps yield zero or negative values.
    pub fn duration(&self) -> Duration {
        self.end() - self.start()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A transaction event together with its child spans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub measurements: FxHashMap<String, Measurement>,
}

impl Event {
    pub fn new(event_id: &str, start_timestamp: f64, spans: Vec<Span>) -> Self {
        Self {
            event_id: Some(event_id.to_string()),
            start_timestamp: Some(start_timestamp),
            spans,
            measurements: FxHashMap::default(),
        }
    }

    pub fn with_measurement(mut self, name: &str, value: f64, unit: Option<&str>) -> Self {
        self.measurements.insert(
            name.to_string(),
            Measurement {
                value: Some(value),
                unit: unit.map(str::to_string),
            },
        );
        self
    }

    pub fn event_id(&self) -> Option<&str> {
        non_empty(&self.event_id)
    }

    /// Transaction start as a delta since epoch, zero when missing
    pub fn start(&self) -> Duration {
        seconds_to_delta(self.start_timestamp.unwrap_or(0.0))
    }

    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.get(name)
    }

    pub fn fcp(&self) -> Option<&Measurement> {
        self.measurement(FCP_MEASUREMENT)
    }

    /// Whether spans are ascending by start timestamp
    pub fn spans_are_ordered(&self) -> bool {
        self.spans.windows(2).all(|pair| pair[0].start() <= pair[1].start())
    }
}
