use chrono::Duration;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::{fingerprint_span_op, Fingerprint};
use crate::detection::settings::{settings_for_span, ConcurrencyThresholds, DetectionSettings, DetectorType};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, Span};

/// The current run of concurrent spans for one op
#[derive(Debug)]
struct ConcurrentRun<'a> {
    most_recent_start: Duration,
    most_recent_hash: &'a str,
    spans_involved: Vec<String>,
}

impl<'a> ConcurrentRun<'a> {
    fn new() -> Self {
        Self {
            most_recent_start: Duration::zero(),
            most_recent_hash: "",
            spans_involved: Vec::new(),
        }
    }
}

/// Checks for multiple concurrent API calls sharing the same structure.
///
/// Non-greedy: stores the first `count` spans of a concurrent series rather
/// than the whole series, and only the first such series per op. Assumes spans
/// arrive in start order.
#[derive(Debug)]
pub struct NPlusOneSpanDetector<'a> {
    settings: &'a [ConcurrencyThresholds],
    runs: FxHashMap<Fingerprint, ConcurrentRun<'a>>,
    stored_issues: StoredIssues,
}

impl<'a> NPlusOneSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings) -> Self {
        Self {
            settings: &settings.n_plus_one_spans,
            runs: FxHashMap::default(),
            stored_issues: StoredIssues::new(),
        }
    }
}

impl<'a> PerformanceDetector<'a> for NPlusOneSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::NPlusOneSpans
    }

    fn visit_span(&mut self, span: &'a Span) {
        let Some(matched) = settings_for_span(self.settings, span) else {
            return;
        };
        let Some(fingerprint) = fingerprint_span_op(span) else {
            return;
        };
        let Some(hash) = span.hash() else {
            return;
        };

        let start_time_threshold = millis_to_delta(matched.settings.start_time_threshold);
        let span_start = span.start();
        let run = self.runs.entry(fingerprint.clone()).or_insert_with(ConcurrentRun::new);

        let is_concurrent = span_start - run.most_recent_start < start_time_threshold;
        let has_same_hash = run.most_recent_hash == hash;
        run.most_recent_start = span_start;
        run.most_recent_hash = hash;

        if !(is_concurrent && has_same_hash) {
            run.spans_involved = vec![matched.span_id.to_string()];
            return;
        }
        run.spans_involved.push(matched.span_id.to_string());

        if !self.stored_issues.contains(&fingerprint) && run.spans_involved.len() >= matched.settings.count {
            debug!(
                fingerprint = %fingerprint,
                hash,
                spans = run.spans_involved.len(),
                "Concurrent N+1 spans detected"
            );
            let issue = PerformanceIssue::new(
                fingerprint,
                matched.span_id,
                matched.op_prefix,
                run.spans_involved.clone(),
            );
            self.stored_issues.insert_if_absent(issue);
        }
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}
