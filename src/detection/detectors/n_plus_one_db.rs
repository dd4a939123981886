use chrono::Duration;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::common::constants::DB_SPAN_OP;
use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::fingerprint_n_plus_one_db;
use crate::detection::settings::{DetectionSettings, DetectorType, NPlusOneDbSettings};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, saturating_add, Span};

/// Identifies database N+1 queries: a source query followed by a run of
/// sequential, structurally identical queries under the same parent.
///
/// Issues are only stored when the parent span can be resolved, so that two
/// matching fingerprints point at the same location in code. Several distinct
/// issues may be stored for one event.
#[derive(Debug)]
pub struct NPlusOneDbSpanDetector<'a> {
    settings: &'a NPlusOneDbSettings,
    /// Non-db spans that are not the root, by span id
    potential_parents: FxHashMap<&'a str, &'a Span>,
    source_span: Option<&'a Span>,
    n_hash: Option<&'a str>,
    n_spans: Vec<&'a Span>,
    stored_issues: StoredIssues,
}

impl<'a> NPlusOneDbSpanDetector<'a> {
    pub fn new(settings: &'a DetectionSettings) -> Self {
        Self {
            settings: &settings.n_plus_one_db_spans,
            potential_parents: FxHashMap::default(),
            source_span: None,
            n_hash: None,
            n_spans: Vec::new(),
            stored_issues: StoredIssues::new(),
        }
    }

    fn maybe_use_as_source(&mut self, span: &'a Span) {
        let Some(parent_span_id) = span.parent_span_id() else {
            return;
        };
        if self.potential_parents.contains_key(parent_span_id) {
            self.source_span = Some(span);
        }
    }

    fn continues_n_plus_one(&mut self, source: &'a Span, span: &'a Span) -> bool {
        if self.overlaps_last_span(source, span) {
            return false;
        }

        let Some(parent_id) = span.parent_span_id() else {
            return false;
        };
        if source.parent_span_id() != Some(parent_id) {
            return false;
        }

        let Some(span_hash) = span.hash() else {
            return false;
        };
        match self.n_hash {
            Some(n_hash) => n_hash == span_hash,
            None => {
                self.n_hash = Some(span_hash);
                true
            }
        }
    }

    fn overlaps_last_span(&self, source: &Span, span: &Span) -> bool {
        let last_span = self.n_spans.last().copied().unwrap_or(source);
        last_span.end() > span.start()
    }

    fn maybe_store_issue(&mut self) {
        let Some(source) = self.source_span else {
            return;
        };
        let Some(&first) = self.n_spans.first() else {
            return;
        };

        if self.n_spans.len() < self.settings.count {
            return;
        }

        let total_duration = self
            .n_spans
            .iter()
            .fold(Duration::zero(), |total, span| saturating_add(total, span.duration()));
        if total_duration < millis_to_delta(self.settings.duration_threshold) {
            return;
        }

        let Some(parent) = source
            .parent_span_id()
            .and_then(|parent_span_id| self.potential_parents.get(parent_span_id))
        else {
            return;
        };

        let fingerprint = fingerprint_n_plus_one_db(parent.op(), parent.hash(), source.hash(), first.hash());
        if self.stored_issues.contains(&fingerprint) {
            return;
        }

        let span_id = first.span_id().unwrap_or_default();
        let spans_involved = self
            .n_spans
            .iter()
            .filter_map(|span| span.span_id())
            .map(str::to_string)
            .collect();

        debug!(
            fingerprint = %fingerprint,
            span_id,
            spans = self.n_spans.len(),
            total_ms = total_duration.num_milliseconds(),
            "N+1 database queries detected"
        );
        let issue = PerformanceIssue::new(fingerprint, span_id, DB_SPAN_OP, spans_involved);
        self.stored_issues.insert_if_absent(issue);
    }

    fn reset_detection(&mut self) {
        self.source_span = None;
        self.n_hash = None;
        self.n_spans.clear();
    }
}

impl<'a> PerformanceDetector<'a> for NPlusOneDbSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        DetectorType::NPlusOneDbSpans
    }

    fn visit_span(&mut self, span: &'a Span) {
        let (Some(span_id), Some(op)) = (span.span_id(), span.op()) else {
            return;
        };

        if op != DB_SPAN_OP {
            // Any other operation breaks up the run being tracked
            self.maybe_store_issue();
            self.reset_detection();
            if span.parent_span_id().is_some() {
                self.potential_parents.insert(span_id, span);
            }
            return;
        }

        let Some(source) = self.source_span else {
            self.maybe_use_as_source(span);
            return;
        };

        if self.continues_n_plus_one(source, span) {
            self.n_spans.push(span);
        } else {
            trace!(span_id, "Database run broken, looking for a new source");
            self.maybe_store_issue();
            self.reset_detection();
            self.maybe_use_as_source(span);
        }
    }

    fn visited_all_spans(&mut self) {
        self.maybe_store_issue();
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}
