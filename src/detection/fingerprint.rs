use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::common::constants::{MISSING_FINGERPRINT_PART, SPAN_FINGERPRINT_LEN};
use crate::event::Span;

/// Stable identifier grouping detections of the same defect across events
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn sha1_hex(parts: &[&str]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Truncated sha1 over op and description. Not a cryptographic usage, 80 bits
/// are plenty to tell span signatures apart.
pub fn fingerprint_span(span: &Span) -> Option<Fingerprint> {
    let op = span.op()?;
    let description = span.description()?;

    let mut digest = sha1_hex(&[op, description]);
    digest.truncate(SPAN_FINGERPRINT_LEN);
    Some(Fingerprint(digest))
}

/// Coarse fingerprint: the bare span op
pub fn fingerprint_span_op(span: &Span) -> Option<Fingerprint> {
    span.op().map(Fingerprint::new)
}

/// The upstream structural hash of the span
pub fn fingerprint_span_hash(span: &Span) -> Option<Fingerprint> {
    span.hash().map(Fingerprint::new)
}

/// Full sha1 over the context of a database N+1: the parent's op and hash, the
/// source query's hash and the repeated query's hash. A missing part is
/// written as `None` so digests line up with existing issue groups.
pub fn fingerprint_n_plus_one_db(
    parent_op: Option<&str>,
    parent_hash: Option<&str>,
    source_hash: Option<&str>,
    n_hash: Option<&str>,
) -> Fingerprint {
    let parts = [parent_op, parent_hash, source_hash, n_hash].map(|part| part.unwrap_or(MISSING_FINGERPRINT_PART));
    Fingerprint(sha1_hex(&parts))
}
