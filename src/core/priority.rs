//! Publication priority used to pick the best record among duplicates.

use serde::{Deserialize, Serialize};

/// Venue tokens that identify a major CS/ML/NLP conference.
///
/// Matched as lowercase substrings of the venue text. Acronyms cover DBLP
/// and arXiv comments; full names cover Semantic Scholar and CrossRef.
pub const MAJOR_VENUE_TOKENS: &[&str] = &[
    "icml",
    "neurips",
    "nips",
    "iclr",
    "aaai",
    "ijcai",
    "acl",
    "emnlp",
    "naacl",
    "coling",
    "cvpr",
    "iccv",
    "eccv",
    "kdd",
    "sigir",
    "neural information processing systems",
    "international conference on machine learning",
    "learning representations",
    "association for computational linguistics",
    "empirical methods in natural language processing",
    "international conference on computational linguistics",
    "joint conference on artificial intelligence",
    "conference on artificial intelligence",
    "computer vision and pattern recognition",
    "conference on computer vision",
    "knowledge discovery and data mining",
    "research and development in information retrieval",
];

/// Publication priority of a candidate, ordered from lowest to highest.
///
/// Discriminants are the ordinal rank, so the derived [`Ord`] puts
/// [`Major`](PublicationPriority::Major) above everything else and a
/// strictly-greater comparison decides whether a duplicate replaces the
/// record already kept.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PublicationPriority {
    /// Venue unknown or unrecognised.
    #[default]
    Unknown = 0,
    /// Preprint server (arXiv, `CoRR`).
    Preprint = 1,
    /// Workshop paper.
    Workshop = 2,
    /// Conference proceedings or journal article.
    Archival = 3,
    /// Major conference.
    Major = 4,
}

impl PublicationPriority {
    /// Classifies a venue string.
    ///
    /// `journal` is the raw journal field when the record carried one; a
    /// journal that is not a preprint server counts as archival.
    #[must_use]
    pub fn classify(venue: &str, journal: Option<&str>) -> Self {
        let venue = venue.to_lowercase();
        let journal = journal.map(str::to_lowercase).unwrap_or_default();
        let is_preprint = |s: &str| s.contains("arxiv") || s.contains("corr");

        if MAJOR_VENUE_TOKENS.iter().any(|token| venue.contains(token)) {
            Self::Major
        } else if venue.contains("proceedings")
            || venue.contains("journal")
            || (!journal.is_empty() && !is_preprint(&journal))
        {
            Self::Archival
        } else if venue.contains("workshop") {
            Self::Workshop
        } else if is_preprint(&venue) || is_preprint(&journal) {
            Self::Preprint
        } else {
            Self::Unknown
        }
    }

    /// Returns the numeric rank (0-4).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Preprint => "preprint",
            Self::Workshop => "workshop",
            Self::Archival => "archival",
            Self::Major => "major",
        }
    }
}

impl std::fmt::Display for PublicationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
