use tracing::debug;

use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::fingerprint_span;
use crate::detection::settings::{settings_for_span, DetectionSettings, DetectorType, DurationThresholds};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, Span};

/// Check for individually slow spans of certain ops (eg. slow db spans)
#[derive(Debug)]
pub struct SlowSpanDetector<'a> {
    settings: &'a [DurationThresholds],
    stored_issues: StoredIssues,
}

impl<'a> SlowSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings) -> Self {
        Self {
            settings: &settings.slow_span,
            stored_issues: StoredIssues::new(),
        }
    }
}

impl<'a> PerformanceDetector<'a> for SlowSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::SlowSpan
    }

    fn visit_span(&mut self, span: &'a Span) {
        let Some(matched) = settings_for_span(self.settings, span) else {
            return;
        };
        let Some(fingerprint) = fingerprint_span(span) else {
            return;
        };

        if matched.duration < millis_to_delta(matched.settings.duration_threshold)
            || self.stored_issues.contains(&fingerprint)
        {
            return;
        }

        debug!(
            fingerprint = %fingerprint,
            span_id = matched.span_id,
            duration_ms = matched.duration.num_milliseconds(),
            "Slow span detected"
        );
        let issue = PerformanceIssue::new(
            fingerprint,
            matched.span_id,
            matched.op_prefix,
            vec![matched.span_id.to_string()],
        );
        self.stored_issues.insert_if_absent(issue);
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}
