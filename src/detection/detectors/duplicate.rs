use chrono::Duration;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::detection::detector::PerformanceDetector;
use crate::detection::fingerprint::{fingerprint_span, fingerprint_span_hash, Fingerprint};
use crate::detection::settings::{settings_for_span, CountThresholds, DetectionSettings, DetectorType};
use crate::detection::structs::{PerformanceIssue, StoredIssues};
use crate::event::{millis_to_delta, saturating_add, Span};

/// How duplicate spans are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateGrouping {
    /// sha1 of op and description
    Description,
    /// The upstream span grouping hash
    Hash,
}

/// Broadly check for duplicate spans: the same span repeated `count` times
/// with enough cumulative duration.
#[derive(Debug)]
pub struct DuplicateSpanDetector<'a> {
    grouping: DuplicateGrouping,
    settings: &'a [CountThresholds],
    cumulative_durations: FxHashMap<Fingerprint, Duration>,
    spans_involved: FxHashMap<Fingerprint, Vec<String>>,
    stored_issues: StoredIssues,
}

impl<'a> DuplicateSpanDetector<'a> {
    pub fn new(grouping: DuplicateGrouping, settings: &'a DetectionSettings) -> Self {
        let settings = match grouping {
            DuplicateGrouping::Description => &settings.duplicate_spans,
            DuplicateGrouping::Hash => &settings.duplicate_spans_hash,
        };
        Self {
            grouping,
            settings,
            cumulative_durations: FxHashMap::default(),
            spans_involved: FxHashMap::default(),
            stored_issues: StoredIssues::new(),
        }
    }

    pub fn by_description(settings: &'a DetectionSettings) -> Self {
        Self::new(DuplicateGrouping::Description, settings)
    }

    pub fn by_hash(settings: &'a DetectionSettings) -> Self {
        Self::new(DuplicateGrouping::Hash, settings)
    }

    fn fingerprint(&self, span: &Span) -> Option<Fingerprint> {
        match self.grouping {
            DuplicateGrouping::Description => fingerprint_span(span),
            DuplicateGrouping::Hash => fingerprint_span_hash(span),
        }
    }
}

impl<'a> PerformanceDetector<'a> for DuplicateSpanDetector<'a> {
    fn detector_type(&self) -> DetectorType {
        match self.grouping {
            DuplicateGrouping::Description => DetectorType::DuplicateSpans,
            DuplicateGrouping::Hash => DetectorType::DuplicateSpansHash,
        }
    }

    fn visit_span(&mut self, span: &'a Span) {
        let detector_type = self.detector_type();
        let Some(matched) = settings_for_span(self.settings, span) else {
            return;
        };
        let Some(fingerprint) = self.fingerprint(span) else {
            return;
        };

        let cumulative = self
            .cumulative_durations
            .entry(fingerprint.clone())
            .or_insert_with(Duration::zero);
        *cumulative = saturating_add(*cumulative, matched.duration);
        let cumulative = *cumulative;

        let involved = self.spans_involved.entry(fingerprint.clone()).or_default();
        involved.push(matched.span_id.to_string());

        if self.stored_issues.contains(&fingerprint) {
            return;
        }

        if involved.len() >= matched.settings.count
            && cumulative >= millis_to_delta(matched.settings.cumulative_duration)
        {
            let mut issue = PerformanceIssue::new(
                fingerprint.clone(),
                matched.span_id,
                matched.op_prefix,
                involved.clone(),
            );
            if self.grouping == DuplicateGrouping::Hash {
                issue = issue.with_hash(fingerprint.as_str());
            }
            debug!(
                detector = %detector_type,
                fingerprint = %fingerprint,
                spans = issue.spans_involved.len(),
                "Duplicate spans detected"
            );
            self.stored_issues.insert_if_absent(issue);
        }
    }

    fn stored_issues(&self) -> &StoredIssues {
        &self.stored_issues
    }
}
