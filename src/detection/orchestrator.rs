use tracing::{debug, warn};

use crate::detection::detector::{Detector, PerformanceDetector};
use crate::detection::report::DetectionReport;
use crate::detection::settings::DetectionSettings;
use crate::event::{Event, Span};

/// One detection pass over one event.
///
/// Owns a fresh detector of each kind; nothing is shared between passes, so a
/// pass can be built, run and discarded independently of any other.
pub struct PerformanceDetection<'a> {
    event: &'a Event,
    detectors: Vec<Detector<'a>>,
}

impl<'a> PerformanceDetection<'a> {
    pub fn new(event: &'a Event, settings: &'a DetectionSettings) -> Self {
        Self {
            event,
            detectors: Detector::all(settings, event),
        }
    }

    /// Spans in ascending start order. The event itself is never reordered.
    fn ordered_spans(&self) -> Vec<&'a Span> {
        let mut spans: Vec<&'a Span> = self.event.spans.iter().collect();
        if !self.event.spans_are_ordered() {
            warn!(
                event_id = self.event.event_id().unwrap_or_default(),
                spans = spans.len(),
                "Spans not ordered by start timestamp, sorting before detection"
            );
            spans.sort_by_key(|span| span.start());
        }
        spans
    }

    /// Visit every span against every detector in registration order, then
    /// finalize all detectors and collect their findings.
    pub fn run(mut self) -> DetectionReport {
        let spans = self.ordered_spans();

        for span in spans {
            for detector in self.detectors.iter_mut() {
                detector.visit_span(span);
            }
        }
        for detector in self.detectors.iter_mut() {
            detector.visited_all_spans();
        }

        let report = DetectionReport::from_detectors(self.event.event_id(), &self.detectors);
        debug!(
            event_id = self.event.event_id().unwrap_or_default(),
            spans = self.event.spans.len(),
            issues = report.all_issue_count(),
            "Performance detection pass complete"
        );
        report
    }
}

/// Run every detector over the event's spans
pub fn detect_performance_issues(event: &Event, settings: &DetectionSettings) -> DetectionReport {
    PerformanceDetection::new(event, settings).run()
}
