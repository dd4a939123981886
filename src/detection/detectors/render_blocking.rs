use chrono::Duration;
use tracing::{debug, trace};

use crate::common::constants::MILLISECOND_UNIT;
use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::fingerprint_span;
use crate::detection::settings::{DetectionSettings, DetectorType, RenderBlockingSettings};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, Event, Span};

/// Checks for resource loads that delay first contentful paint.
///
/// Only active for transactions whose FCP falls inside the configured range.
/// Allowed ops are matched exactly.
#[derive(Debug)]
pub struct RenderBlockingAssetSpanDetector<'a> {
    settings: &'a RenderBlockingSettings,
    transaction_start: Duration,
    /// Cleared once no later span can precede FCP
    fcp: Option<Duration>,
    stored_issues: StoredIssues,
}

impl<'a> RenderBlockingAssetSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings, event: &Event) -> Self {
        let settings = &settings.render_blocking_asset_span;
        Self {
            settings,
            transaction_start: event.start(),
            fcp: Self::applicable_fcp(settings, event),
            stored_issues: StoredIssues::new(),
        }
    }

    fn applicable_fcp(settings: &RenderBlockingSettings, event: &Event) -> Option<Duration> {
        let measurement = event.fcp()?;
        let value = measurement.value.filter(|value| *value != 0.0)?;
        if measurement.unit.as_deref().is_some_and(|unit| unit != MILLISECOND_UNIT) {
            return None;
        }

        let fcp = millis_to_delta(value);
        let minimum = millis_to_delta(settings.fcp_minimum_threshold);
        let maximum = millis_to_delta(settings.fcp_maximum_threshold);
        (fcp >= minimum && fcp < maximum).then_some(fcp)
    }

    fn is_blocking_render(&self, span: &Span, fcp: Duration) -> bool {
        if span.end() >= self.transaction_start + fcp {
            return false;
        }

        let Some(fcp_micros) = fcp.num_microseconds().filter(|micros| *micros > 0) else {
            return false;
        };
        let duration_micros = span.duration().num_microseconds().unwrap_or(0);
        duration_micros as f64 / fcp_micros as f64 > self.settings.fcp_ratio_threshold
    }
}

impl<'a> PerformanceDetector<'a> for RenderBlockingAssetSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::RenderBlockingAssetSpan
    }

    fn visit_span(&mut self, span: &'a Span) {
        let Some(fcp) = self.fcp else {
            return;
        };
        let Some(op) = span.op() else {
            return;
        };
        if !self.settings.allowed_span_ops.iter().any(|allowed| allowed == op) {
            return;
        }

        if self.is_blocking_render(span, fcp) {
            if let (Some(span_id), Some(fingerprint)) = (span.span_id(), fingerprint_span(span)) {
                debug!(fingerprint = %fingerprint, span_id, "Render blocking asset detected");
                let issue = PerformanceIssue::new(fingerprint, span_id, op, vec![span_id.to_string()]);
                self.stored_issues.insert_if_absent(issue);
            }
        }

        // Spans arrive in start order, so nothing after this one can block FCP
        if span.start() >= self.transaction_start + fcp {
            trace!("Span started after FCP, render blocking detection finished");
            self.fcp = None;
        }
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}
