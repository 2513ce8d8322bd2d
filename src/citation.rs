//! Citation formatting.
//!
//! [`CitationFormatter`] renders one [`Candidate`] into a citation block.
//! The shipped implementation, [`BibtexFormatter`], produces BibTeX.

use std::fmt::Write;

use crate::core::text::preview;
use crate::core::{Candidate, PublicationPriority};

/// Abstracts longer than this many characters are cut with `...`.
const ABSTRACT_LIMIT: usize = 500;

/// Renders candidates into citation blocks.
pub trait CitationFormatter: Send + Sync {
    /// Renders one candidate, or returns `None` when it cannot be
    /// formatted (the aggregator then skips it).
    fn render(&self, candidate: &Candidate) -> Option<String>;
}

/// BibTeX entry types produced by [`BibtexFormatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// `@inproceedings`, venue written as `booktitle`.
    InProceedings,
    /// `@article`, venue written as `journal`.
    Article,
    /// `@misc`, venue written as `howpublished`.
    Misc,
}

impl EntryType {
    /// Chooses the entry type for a candidate.
    #[must_use]
    pub fn for_candidate(candidate: &Candidate) -> Self {
        let venue = candidate.venue.to_lowercase();
        if venue.is_empty() {
            return if candidate.arxiv_id.is_some() {
                Self::Misc
            } else {
                Self::Article
            };
        }
        if ["conference", "proceedings", "workshop", "symposium"]
            .iter()
            .any(|w| venue.contains(w))
            || candidate.priority() == PublicationPriority::Major
        {
            Self::InProceedings
        } else if venue.contains("arxiv") || venue.contains("corr") {
            Self::Misc
        } else {
            Self::Article
        }
    }

    /// Returns the BibTeX type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProceedings => "inproceedings",
            Self::Article => "article",
            Self::Misc => "misc",
        }
    }

    /// Returns the field the venue is written to.
    #[must_use]
    pub const fn venue_field(self) -> &'static str {
        match self {
            Self::InProceedings => "booktitle",
            Self::Article => "journal",
            Self::Misc => "howpublished",
        }
    }
}

/// BibTeX renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibtexFormatter;

impl BibtexFormatter {
    /// Builds the citation key: first author's last name plus year, or
    /// `paper` when either is missing.
    #[must_use]
    pub fn citation_key(candidate: &Candidate) -> String {
        let last_name: String = candidate
            .authors
            .first()
            .and_then(|a| a.split_whitespace().last())
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if last_name.is_empty() || candidate.year.is_empty() {
            "paper".to_string()
        } else {
            format!("{last_name}{}", candidate.year)
        }
    }
}

impl CitationFormatter for BibtexFormatter {
    fn render(&self, candidate: &Candidate) -> Option<String> {
        let title = clean(&candidate.title);
        if title.is_empty() {
            return None;
        }
        let entry = EntryType::for_candidate(candidate);

        let mut fields: Vec<(&str, String)> = vec![("title", title)];
        if !candidate.authors.is_empty() {
            fields.push(("author", clean(&candidate.authors.join(" and "))));
        }
        let venue = clean(&candidate.venue);
        if !venue.is_empty() {
            fields.push((entry.venue_field(), venue));
        }
        if !candidate.year.is_empty() {
            fields.push(("year", candidate.year.clone()));
        }
        let url = if candidate.url.is_empty() {
            candidate.document_url()
        } else {
            Some(candidate.url.as_str())
        };
        if let Some(url) = url {
            fields.push(("url", url.to_string()));
        }
        if let Some(doi) = candidate.doi.as_deref().filter(|d| !d.is_empty()) {
            fields.push(("doi", clean(doi)));
        }
        if let Some(id) = candidate.arxiv_id.as_deref().filter(|d| !d.is_empty()) {
            fields.push(("eprint", clean(id)));
            fields.push(("archivePrefix", "arXiv".to_string()));
        }
        if let Some(text) = candidate.r#abstract.as_deref() {
            let text = clean(text);
            if !text.is_empty() {
                fields.push(("abstract", preview(&text, ABSTRACT_LIMIT, "...")));
            }
        }

        let mut out = format!("@{}{{{},\n", entry.as_str(), Self::citation_key(candidate));
        let last = fields.len() - 1;
        for (i, (name, value)) in fields.iter().enumerate() {
            let sep = if i == last { "" } else { "," };
            let _ = writeln!(out, "  {name} = {{{value}}}{sep}");
        }
        out.push('}');
        Some(out)
    }
}

/// Removes braces and backslashes and collapses whitespace.
fn clean(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '\\'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
