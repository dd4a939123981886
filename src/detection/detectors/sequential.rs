use chrono::Duration;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::{fingerprint_span_op, Fingerprint};
use crate::detection::settings::{settings_for_span, CountThresholds, DetectionSettings, DetectorType};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, saturating_add, Span};

/// Checks for repeated slow spans that ran one after the other and could have
/// been parallelized.
///
/// Relies on spans arriving in start order. Any overlap between two spans of
/// the same op discards everything accumulated for that op so far.
#[derive(Debug)]
pub struct SequentialSlowSpanDetector<'a> {
    settings: &'a [CountThresholds],
    cumulative_durations: FxHashMap<Fingerprint, Duration>,
    spans_involved: FxHashMap<Fingerprint, Vec<String>>,
    last_span_seen: FxHashMap<Fingerprint, Duration>,
    stored_issues: StoredIssues,
}

impl<'a> SequentialSlowSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings) -> Self {
        Self {
            settings: &settings.sequential_slow_spans,
            cumulative_durations: FxHashMap::default(),
            spans_involved: FxHashMap::default(),
            last_span_seen: FxHashMap::default(),
            stored_issues: StoredIssues::new(),
        }
    }
}

impl<'a> PerformanceDetector<'a> for SequentialSlowSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::SequentialSlowSpans
    }

    fn visit_span(&mut self, span: &'a Span) {
        let Some(matched) = settings_for_span(self.settings, span) else {
            return;
        };
        let Some(fingerprint) = fingerprint_span_op(span) else {
            return;
        };

        let span_end = span.end();
        let involved = self.spans_involved.entry(fingerprint.clone()).or_default();
        involved.push(matched.span_id.to_string());

        let Some(&last_span_end) = self.last_span_seen.get(&fingerprint) else {
            self.last_span_seen.insert(fingerprint.clone(), span_end);
            self.cumulative_durations.insert(fingerprint, matched.duration);
            return;
        };

        if span.start() <= last_span_end {
            trace!(fingerprint = %fingerprint, span_id = matched.span_id, "Overlapping spans, resetting");
            involved.clear();
            self.last_span_seen.remove(&fingerprint);
            self.cumulative_durations.insert(fingerprint, Duration::zero());
            return;
        }

        let cumulative = self
            .cumulative_durations
            .entry(fingerprint.clone())
            .or_insert_with(Duration::zero);
        *cumulative = saturating_add(*cumulative, matched.duration);
        let cumulative = *cumulative;
        self.last_span_seen.insert(fingerprint.clone(), span_end);

        if self.stored_issues.contains(&fingerprint) {
            return;
        }

        if involved.len() >= matched.settings.count
            && cumulative >= millis_to_delta(matched.settings.cumulative_duration)
        {
            debug!(
                fingerprint = %fingerprint,
                spans = involved.len(),
                cumulative_ms = cumulative.num_milliseconds(),
                "Sequential slow spans detected"
            );
            let issue = PerformanceIssue::new(fingerprint, matched.span_id, matched.op_prefix, involved.clone());
            self.stored_issues.insert_if_absent(issue);
        }
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_span(id: &str, start: f64, end: f64) -> Span {
        Span::new(id, "db", start, end).with_description("SELECT * FROM items WHERE id = %s")
    }

    #[test]
    fn test_sequential_spans_detected() {
        let settings = DetectionSettings::default();
        let spans = vec![
            db_span("a", 1.0, 1.5),
            db_span("b", 1.6, 2.1),
            db_span("c", 2.2, 2.7),
        ];

        let mut detector = SequentialSlowSpanDetector::new(&settings);
        detector.visit_span(&spans[0]);
        detector.visit_span(&spans[1]);
        assert!(detector.stored_issues().is_empty());
        detector.visit_span(&spans[2]);

        let issues = detector.stored_issues();
        assert_eq!(issues.len(), 1);
        let issue = issues.first().unwrap();
        assert_eq!(issue.fingerprint, Fingerprint::from("db"));
        assert_eq!(issue.span_id, "c");
        assert_eq!(issue.spans_involved, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_overlap_resets_accumulation() {
        let settings = DetectionSettings::default();
        let spans = vec![
            db_span("a", 1.0, 1.5),
            db_span("b", 1.6, 2.1),
            // starts before b ended
            db_span("overlap", 2.0, 2.5),
            db_span("d", 2.6, 3.1),
            db_span("e", 3.2, 3.7),
        ];

        let mut detector = SequentialSlowSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }
        // d and e alone are two spans, below the count of three
        assert!(detector.stored_issues().is_empty());

        let f = db_span("f", 3.8, 4.3);
        detector.visit_span(&f);
        let issue = detector.stored_issues().first().unwrap();
        assert_eq!(issue.spans_involved, vec!["d", "e", "f"]);
    }

    #[test]
    fn test_touching_spans_count_as_overlapping() {
        let settings = DetectionSettings::default();
        let spans = vec![
            db_span("a", 1.0, 1.5),
            db_span("b", 1.5, 2.0),
            db_span("c", 2.1, 2.6),
            db_span("d", 2.7, 3.2),
        ];
        let mut detector = SequentialSlowSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }
        // b started exactly when a ended, so only c and d remain sequential
        assert!(detector.stored_issues().is_empty());
    }

    #[test]
    fn test_ops_are_tracked_independently() {
        let settings = DetectionSettings::default();
        let spans = vec![
            db_span("db1", 1.0, 1.5),
            Span::new("http1", "http.client", 1.2, 1.7),
            db_span("db2", 1.6, 2.1),
            Span::new("http2", "http.client", 1.8, 2.3),
            db_span("db3", 2.2, 2.7),
        ];
        let mut detector = SequentialSlowSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }
        let issues = detector.stored_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.first().unwrap().spans_involved, vec!["db1", "db2", "db3"]);
    }

    #[test]
    fn test_fast_sequential_spans_are_ignored() {
        let settings = DetectionSettings::default();
        let spans: Vec<Span> = (0..10)
            .map(|i| {
                let start = i as f64;
                db_span(&format!("s{}", i), start, start + 0.1)
            })
            .collect();
        let mut detector = SequentialSlowSpanDetector::new(&settings);
        for span in &spans {
            detector.visit_span(span);
        }
        // 10 * 100ms stays under 1200ms
        assert!(detector.stored_issues().is_empty());
    }
}
