//! Normalized search result records.

use serde::{Deserialize, Serialize};

use super::priority::PublicationPriority;

/// Minimum title length (in characters) for a candidate to take part in
/// deduplication. Titles at or below this length are dropped.
pub const MIN_TITLE_CHARS: usize = 10;

/// One normalized search or document hit.
///
/// Every provider's raw record is mapped into this shape by
/// [`normalize`](crate::core::normalize::normalize). Empty strings mean
/// "unknown"; optional identifiers are omitted from JSON when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Paper title.
    pub title: String,
    /// Author names in publication order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Four-digit year, or empty.
    #[serde(default)]
    pub year: String,
    /// Venue, booktitle or journal name.
    #[serde(default)]
    pub venue: String,
    /// Raw journal field, kept for priority classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    /// Landing page URL.
    #[serde(default)]
    pub url: String,
    /// Direct PDF URL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    /// Abstract or summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
    /// Provider that produced the record.
    #[serde(default)]
    pub source: String,
    /// Digital Object Identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// arXiv identifier (e.g. `1706.03762`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    /// Provider-specific paper identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
}

impl Candidate {
    /// Returns the dedup key for this candidate, or `None` when the title
    /// is too short to take part in deduplication.
    #[must_use]
    pub fn dedup_key(&self) -> Option<NormalizedTitle> {
        let title = self.title.trim();
        if title.chars().count() <= MIN_TITLE_CHARS {
            return None;
        }
        let key = NormalizedTitle::new(title);
        (!key.is_empty()).then_some(key)
    }

    /// Returns the publication priority of this candidate's venue.
    #[must_use]
    pub fn priority(&self) -> PublicationPriority {
        PublicationPriority::classify(&self.venue, self.journal.as_deref())
    }

    /// Returns the best URL for fetching the full text, if any.
    #[must_use]
    pub fn document_url(&self) -> Option<&str> {
        self.pdf_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| (!self.url.is_empty()).then_some(self.url.as_str()))
    }
}

/// Case- and punctuation-insensitive title key.
///
/// Lowercased, with every character that is neither a word character nor
/// whitespace removed, and whitespace runs collapsed. Only used for
/// equality; never displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedTitle(String);

impl NormalizedTitle {
    /// Computes the key for a title.
    #[must_use]
    pub fn new(title: &str) -> Self {
        let stripped: String = title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        Self(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Returns `true` if nothing survived normalization.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
