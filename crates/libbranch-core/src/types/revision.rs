use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One historical version of a remote document, as listed by a
/// [`RevisionSource`](crate::source::RevisionSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDescriptor {
    pub revision_id: String,
    pub timestamp: DateTime<Utc>,
    /// Author identity, normally an e-mail address
    pub author: String,
    pub size_bytes: u64,
}

impl RevisionDescriptor {
    pub fn new(
        revision_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            revision_id: revision_id.into(),
            timestamp,
            author: author.into(),
            size_bytes,
        }
    }

    /// Position of this revision in the document's total order
    pub fn key(&self) -> RevisionKey {
        RevisionKey::new(self.timestamp, self.revision_id.clone())
    }
}

/// Total order over revisions: timestamp first, revision id as tie-break
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionKey {
    pub timestamp: DateTime<Utc>,
    pub revision_id: String,
}

impl RevisionKey {
    pub fn new(timestamp: DateTime<Utc>, revision_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            revision_id: revision_id.into(),
        }
    }
}

impl Ord for RevisionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| compare_revision_ids(&self.revision_id, &other.revision_id))
    }
}

impl PartialOrd for RevisionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.revision_id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Tie-break between revision ids at the same timestamp.
///
/// All-digit ids sort before every other id and compare by numeric value
/// ("9" < "10"), with leading zeros breaking exact ties ("07" < "7"). Other
/// ids compare lexically.
pub fn compare_revision_ids(a: &str, b: &str) -> Ordering {
    match (is_numeric_id(a), is_numeric_id(b)) {
        (true, true) => {
            let (ta, tb) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
            ta.len()
                .cmp(&tb.len())
                .then_with(|| ta.cmp(tb))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}
