use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::common::constants::{TAG_ALL_ISSUE_COUNT, TAG_PREFIX, TAG_TRANSACTION};
use crate::detection::detector::{Detector, PerformanceDetector};
use crate::detection::settings::DetectorType;
use crate::detection::structs::{PerformanceIssue, StoredIssues};

/// Issues stored by one detector over one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorFindings {
    pub detector: DetectorType,
    pub issues: StoredIssues,
}

/// A tag to attach to the analysed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionTag {
    pub key: String,
    pub value: String,
}

impl TransactionTag {
    fn new(key: String, value: impl ToString) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Outcome of one detection pass, findings kept in registration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub findings: Vec<DetectorFindings>,
}

impl DetectionReport {
    pub fn from_detectors(event_id: Option<&str>, detectors: &[Detector<'_>]) -> Self {
        let findings = detectors
            .iter()
            .map(|detector| DetectorFindings {
                detector: detector.detector_type(),
                issues: detector.stored_issues().clone(),
            })
            .collect();

        Self {
            event_id: event_id.map(str::to_string),
            findings,
        }
    }

    pub fn all_issue_count(&self) -> usize {
        self.findings.iter().map(|findings| findings.issues.len()).sum()
    }

    pub fn has_detected_issues(&self) -> bool {
        self.all_issue_count() > 0
    }

    pub fn issues(&self, detector: DetectorType) -> Option<&StoredIssues> {
        self.findings
            .iter()
            .find(|findings| findings.detector == detector)
            .map(|findings| &findings.issues)
    }

    /// The earliest issue a detector stored, used as its representative
    pub fn first_issue(&self, detector: DetectorType) -> Option<&PerformanceIssue> {
        self.issues(detector).and_then(StoredIssues::first)
    }

    /// Every stored issue across detectors
    pub fn all_issues(&self) -> impl Iterator<Item = (DetectorType, &PerformanceIssue)> {
        self.findings
            .iter()
            .flat_map(|findings| findings.issues.iter().map(move |issue| (findings.detector, issue)))
    }

    /// Whether each detector found anything
    pub fn detected_flags(&self) -> BTreeMap<DetectorType, bool> {
        self.findings
            .iter()
            .map(|findings| (findings.detector, !findings.issues.is_empty()))
            .collect()
    }

    /// Distinct matched ops per detector that found anything
    pub fn detected_ops(&self) -> BTreeMap<DetectorType, BTreeSet<&str>> {
        self.findings
            .iter()
            .filter(|findings| !findings.issues.is_empty())
            .map(|findings| {
                let ops = findings.issues.iter().map(|issue| issue.allowed_op.as_str()).collect();
                (findings.detector, ops)
            })
            .collect()
    }

    /// Tags for the analysed transaction: the overall count and event id when
    /// anything was found, then fingerprint and span id of each detector's
    /// first issue.
    pub fn transaction_tags(&self) -> Vec<TransactionTag> {
        let mut tags = Vec::new();
        if !self.has_detected_issues() {
            return tags;
        }

        tags.push(TransactionTag::new(TAG_ALL_ISSUE_COUNT.to_string(), self.all_issue_count()));
        if let Some(event_id) = &self.event_id {
            tags.push(TransactionTag::new(TAG_TRANSACTION.to_string(), event_id));
        }

        for findings in &self.findings {
            let Some(first_issue) = findings.issues.first() else {
                continue;
            };
            let key = findings.detector.as_str();
            if !first_issue.fingerprint.as_str().is_empty() {
                tags.push(TransactionTag::new(
                    format!("{}{}_fp", TAG_PREFIX, key),
                    &first_issue.fingerprint,
                ));
            }
            tags.push(TransactionTag::new(format!("{}{}", TAG_PREFIX, key), &first_issue.span_id));
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::fingerprint::Fingerprint;

    fn stored(entries: &[(&str, &str, &str)]) -> StoredIssues {
        let mut issues = StoredIssues::new();
        for (fingerprint, span_id, op) in entries {
            issues.insert_if_absent(PerformanceIssue::new(
                Fingerprint::from(*fingerprint),
                span_id,
                op,
                vec![span_id.to_string()],
            ));
        }
        issues
    }

    fn report(event_id: Option<&str>, findings: Vec<(DetectorType, StoredIssues)>) -> DetectionReport {
        DetectionReport {
            event_id: event_id.map(str::to_string),
            findings: findings
                .into_iter()
                .map(|(detector, issues)| DetectorFindings { detector, issues })
                .collect(),
        }
    }

    #[test]
    fn test_empty_report_has_no_tags() {
        let report = report(
            Some("abc"),
            DetectorType::ALL.iter().map(|&d| (d, StoredIssues::new())).collect(),
        );
        assert_eq!(report.all_issue_count(), 0);
        assert!(!report.has_detected_issues());
        assert!(report.transaction_tags().is_empty());
        assert!(report.detected_flags().values().all(|detected| !detected));
        assert_eq!(report.detected_flags().len(), 8);
    }

    #[test]
    fn test_transaction_tags_use_first_issue_per_detector() {
        let report = report(
            Some("abc"),
            vec![
                (DetectorType::DuplicateSpans, StoredIssues::new()),
                (
                    DetectorType::SlowSpan,
                    stored(&[("fp1", "s1", "db"), ("fp2", "s2", "http")]),
                ),
                (DetectorType::NPlusOneDbSpans, stored(&[("fp3", "s3", "db")])),
            ],
        );

        let tags: Vec<(String, String)> = report
            .transaction_tags()
            .into_iter()
            .map(|tag| (tag.key, tag.value))
            .collect();
        let expected: Vec<(String, String)> = [
            ("_pi_all_issue_count", "3"),
            ("_pi_transaction", "abc"),
            ("_pi_slow_span_fp", "fp1"),
            ("_pi_slow_span", "s1"),
            ("_pi_n_plus_one_db_fp", "fp3"),
            ("_pi_n_plus_one_db", "s3"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(tags, expected);

        assert_eq!(report.first_issue(DetectorType::SlowSpan).unwrap().span_id, "s1");
        assert!(report.first_issue(DetectorType::DuplicateSpans).is_none());
        let ops = report.detected_ops();
        assert_eq!(ops[&DetectorType::SlowSpan].iter().copied().collect::<Vec<_>>(), vec!["db", "http"]);
        assert!(!ops.contains_key(&DetectorType::DuplicateSpans));
    }

    #[test]
    fn test_transaction_tag_omitted_without_event_id() {
        let report = report(None, vec![(DetectorType::LongTaskSpans, stored(&[("fp", "s", "ui.long-task")]))]);
        let keys: Vec<String> = report.transaction_tags().into_iter().map(|tag| tag.key).collect();
        assert_eq!(keys, vec!["_pi_all_issue_count", "_pi_long_task_fp", "_pi_long_task"]);
        assert_eq!(report.all_issues().count(), 1);
    }
}
