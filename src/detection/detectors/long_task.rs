use chrono::Duration;
use tracing::debug;

use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::{fingerprint_span, Fingerprint};
use crate::detection::settings::{
    settings_for_span, CumulativeDurationThresholds, DetectionSettings, DetectorType,
};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, saturating_add, Span};

/// Checks for long UI tasks whose cumulative duration across the event
/// exceeds the threshold.
///
/// At most one issue per event. It is keyed by the span that pushed the
/// total over the threshold, and its evidence keeps growing with every long
/// task seen afterwards.
#[derive(Debug)]
pub struct LongTaskSpanDetector<'a> {
    settings: &'a [CumulativeDurationThresholds],
    cumulative_duration: Duration,
    spans_involved: Vec<String>,
    issue_fingerprint: Option<Fingerprint>,
    stored_issues: StoredIssues,
}

impl<'a> LongTaskSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings) -> Self {
        Self {
            settings: &settings.long_task_spans,
            cumulative_duration: Duration::zero(),
            spans_involved: Vec::new(),
            issue_fingerprint: None,
            stored_issues: StoredIssues::new(),
        }
    }
}

impl<'a> PerformanceDetector<'a> for LongTaskSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::LongTaskSpans
    }

    fn visit_span(&mut self, span: &'a Span) {
        let Some(matched) = settings_for_span(self.settings, span) else {
            return;
        };
        let Some(fingerprint) = fingerprint_span(span) else {
            return;
        };

        self.cumulative_duration = saturating_add(self.cumulative_duration, span.duration());
        self.spans_involved.push(matched.span_id.to_string());

        if let Some(stored) = &self.issue_fingerprint {
            if let Some(issue) = self.stored_issues.get_mut(stored) {
                issue.spans_involved = self.spans_involved.clone();
            }
            return;
        }

        if self.cumulative_duration >= millis_to_delta(matched.settings.cumulative_duration) {
            debug!(
                fingerprint = %fingerprint,
                cumulative_ms = self.cumulative_duration.num_milliseconds(),
                "Long task spans detected"
            );
            let issue = PerformanceIssue::new(
                fingerprint.clone(),
                matched.span_id,
                matched.op_prefix,
                self.spans_involved.clone(),
            );
            self.stored_issues.insert_if_absent(issue);
            self.issue_fingerprint = Some(fingerprint);
        }
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_task(id: &str, start: f64, end: f64) -> Span {
        Span::new(id, "ui.long-task", start, end).with_description("Main UI thread blocked")
    }

    #[test]
    fn test_long_tasks_detected_once_cumulative_threshold_crossed() {
        let settings = DetectionSettings::default();
        let spans = vec![
            long_task("a", 1.0, 1.2),
            long_task("b", 1.3, 1.5),
            long_task("c", 1.6, 1.8),
        ];
        let mut detector = LongTaskSpanDetector::new(&settings);
        detector.visit_span(&spans[0]);
        detector.visit_span(&spans[1]);
        assert!(detector.stored_issues().is_empty());

        detector.visit_span(&spans[2]);
        let issue = detector.stored_issues().first().unwrap();
        assert_eq!(issue.span_id, "c");
        assert_eq!(issue.allowed_op, "ui.long-task");
        assert_eq!(issue.spans_involved, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_evidence_keeps_growing_after_detection() {
        let settings = DetectionSettings::default();
        let spans = vec![
            long_task("a", 1.0, 1.6),
            Span::new("b", "ui.sentry.long-task", 1.7, 1.8).with_description("Long task"),
            long_task("c", 1.9, 2.0),
        ];
        let mut detector = LongTaskSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }

        let issues = detector.stored_issues();
        assert_eq!(issues.len(), 1);
        let issue = issues.first().unwrap();
        assert_eq!(issue.span_id, "a");
        assert_eq!(issue.spans_involved, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_other_ops_and_spans_without_description_are_ignored() {
        let settings = DetectionSettings::default();
        let spans = vec![
            Span::new("a", "ui.long-task", 1.0, 2.0),
            Span::new("b", "ui.render", 2.0, 3.0).with_description("render"),
        ];
        let mut detector = LongTaskSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }
        assert!(detector.stored_issues().is_empty());
    }
}
