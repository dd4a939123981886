use rustc_hash::FxHashMap;
use serde::ser::{Serialize, Serializer};

use crate::detection::fingerprint::Fingerprint;

/// A detected performance problem
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerformanceIssue {
    pub fingerprint: Fingerprint,
    /// The span that triggered the detection
    pub span_id: String,
    /// The op prefix the span was matched under
    pub allowed_op: String,
    /// Evidence, in visiting order
    pub spans_involved: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl PerformanceIssue {
    pub fn new(fingerprint: Fingerprint, span_id: &str, allowed_op: &str, spans_involved: Vec<String>) -> Self {
        Self {
            fingerprint,
            span_id: span_id.to_string(),
            allowed_op: allowed_op.to_string(),
            spans_involved,
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.hash = Some(hash.to_string());
        self
    }
}

/// Issues keyed by fingerprint, iterated in the order they were stored.
///
/// Entries are never removed and, once stored, never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredIssues {
    issues: Vec<PerformanceIssue>,
    index: FxHashMap<Fingerprint, usize>,
}

impl StoredIssues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&PerformanceIssue> {
        self.index.get(fingerprint).map(|&position| &self.issues[position])
    }

    /// The earliest stored issue
    pub fn first(&self) -> Option<&PerformanceIssue> {
        self.issues.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerformanceIssue> {
        self.issues.iter()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.issues.iter().map(|issue| &issue.fingerprint)
    }

    /// Store the issue unless its fingerprint is already present. Returns
    /// whether the issue was stored.
    pub(crate) fn insert_if_absent(&mut self, issue: PerformanceIssue) -> bool {
        if self.index.contains_key(&issue.fingerprint) {
            return false;
        }
        self.index.insert(issue.fingerprint.clone(), self.issues.len());
        self.issues.push(issue);
        true
    }

    pub(crate) fn get_mut(&mut self, fingerprint: &Fingerprint) -> Option<&mut PerformanceIssue> {
        let position = *self.index.get(fingerprint)?;
        self.issues.get_mut(position)
    }
}

impl<'a> IntoIterator for &'a StoredIssues {
    type Item = &'a PerformanceIssue;
    type IntoIter = std::slice::Iter<'a, PerformanceIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

impl Serialize for StoredIssues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.issues.iter().map(|issue| (&issue.fingerprint, issue)))
    }
}
