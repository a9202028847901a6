//! Failure lists for the final report.

use std::collections::BTreeSet;
use std::fmt;

/// Append-only lists of resources that could not be backed up.
///
/// Entries may repeat; [`FailureRegistry::summary`] deduplicates.
#[derive(Debug, Clone, Default)]
pub struct FailureRegistry {
    pages: Vec<u64>,
    attachments: Vec<String>,
    comments: Vec<u64>,
}

impl FailureRegistry {
    pub fn push_page(&mut self, page: u64) {
        self.pages.push(page);
    }

    /// Attachment key, `{card}-{name}` (or `{card}-attachments.xml` for the list itself).
    pub fn push_attachment(&mut self, key: String) {
        self.attachments.push(key);
    }

    pub fn push_comments(&mut self, card: u64) {
        self.comments.push(card);
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.attachments.is_empty() && self.comments.is_empty()
    }

    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            pages: self.pages.iter().copied().collect(),
            attachments: self.attachments.iter().cloned().collect(),
            comments: self.comments.iter().copied().collect(),
        }
    }
}

/// Deduplicated, sorted view of a [`FailureRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    pub pages: BTreeSet<u64>,
    pub attachments: BTreeSet<String>,
    pub comments: BTreeSet<u64>,
}

impl FailureSummary {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.attachments.is_empty() && self.comments.is_empty()
    }

    pub fn total(&self) -> usize {
        self.pages.len() + self.attachments.len() + self.comments.len()
    }
}

impl fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no failures");
        }
        let mut parts = Vec::new();
        if !self.pages.is_empty() {
            parts.push(format!("card pages {:?}", self.pages));
        }
        if !self.attachments.is_empty() {
            parts.push(format!("attachments {:?}", self.attachments));
        }
        if !self.comments.is_empty() {
            parts.push(format!("murmurs of cards {:?}", self.comments));
        }
        write!(f, "{}", parts.join("; "))
    }
}
