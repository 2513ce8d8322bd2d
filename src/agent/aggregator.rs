//! Result aggregation: collect, deduplicate, rank and render candidates.
//!
//! The aggregator reads the whole conversation. A JSON array emitted by the
//! model is authoritative when one parses; otherwise every candidate-bearing
//! tool result is used. Duplicates (same [`NormalizedTitle`]) collapse to
//! the record with the highest [`PublicationPriority`], first-seen winning
//! ties, and the survivors are capped and rendered.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::conversation::{Conversation, Turn};
use super::registry::is_error_result;
use super::tool::ToolKind;
use crate::citation::CitationFormatter;
use crate::core::{Candidate, NormalizedTitle, PublicationPriority, normalize_all};

/// Answer returned when no candidate survives aggregation.
pub const NO_PAPERS_FOUND: &str = "No papers found.";

/// Source tag for candidates taken from the model's own JSON output.
pub const MODEL_SOURCE: &str = "model";

/// Fenced JSON blocks in model output.
static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").ok());

/// Trailing commas before a closing bracket or brace.
static TRAILING_COMMA: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").ok());

/// The deduplicated, ranked, size-capped candidate list of one query.
///
/// Enrichment produces a new list; individual candidates are replaced,
/// never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShortList(Vec<Candidate>);

impl ShortList {
    /// Wraps already-deduplicated candidates.
    #[must_use]
    pub const fn new(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }

    /// Returns the candidates in rank order.
    #[must_use]
    pub fn as_slice(&self) -> &[Candidate] {
        &self.0
    }

    /// Iterates over the candidates.
    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.0.iter()
    }

    /// Returns the number of candidates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list holds no candidates.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new list with every candidate passed through `f`.
    #[must_use]
    pub fn replaced_with(&self, f: impl Fn(&Candidate) -> Candidate) -> Self {
        Self(self.0.iter().map(f).collect())
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_inner(self) -> Vec<Candidate> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ShortList {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Candidates that were rendered, in rank order.
    pub shortlist: ShortList,
    /// Rendered citation block, or [`NO_PAPERS_FOUND`].
    pub rendered: String,
}

impl Aggregation {
    /// Returns `true` if nothing survived aggregation.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.shortlist.is_empty()
    }
}

/// Collapses a conversation into a rendered shortlist.
pub struct Aggregator<'a> {
    formatter: &'a dyn CitationFormatter,
    cap: usize,
}

impl<'a> Aggregator<'a> {
    /// Creates an aggregator keeping at most `cap` candidates.
    #[must_use]
    pub fn new(formatter: &'a dyn CitationFormatter, cap: usize) -> Self {
        Self {
            formatter,
            cap: cap.max(1),
        }
    }

    /// Aggregates everything seen so far in `conversation`.
    #[must_use]
    pub fn aggregate(&self, conversation: &Conversation) -> Aggregation {
        self.aggregate_candidates(collect_candidates(conversation))
    }

    /// Deduplicates, caps and renders `candidates`.
    #[must_use]
    pub fn aggregate_candidates(&self, candidates: Vec<Candidate>) -> Aggregation {
        let mut blocks = Vec::new();
        let mut rendered = Vec::new();
        for candidate in deduplicate(candidates, self.cap) {
            match self.formatter.render(&candidate) {
                Some(block) if !block.trim().is_empty() => {
                    blocks.push(block);
                    rendered.push(candidate);
                }
                _ => debug!(title = %candidate.title, "skipping candidate that did not render"),
            }
        }

        if blocks.is_empty() {
            Aggregation {
                shortlist: ShortList::default(),
                rendered: NO_PAPERS_FOUND.to_string(),
            }
        } else {
            Aggregation {
                shortlist: ShortList::new(rendered),
                rendered: blocks.join("\n\n"),
            }
        }
    }
}

impl std::fmt::Debug for Aggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

/// Gathers candidates from a conversation.
///
/// The newest model-emitted JSON array that parses wins outright. Without
/// one, candidates come from successful search tool results in
/// conversation order.
#[must_use]
pub fn collect_candidates(conversation: &Conversation) -> Vec<Candidate> {
    let from_model = conversation.turns().iter().rev().find_map(|turn| match turn {
        Turn::Assistant { content, .. } => model_candidates(content),
        _ => None,
    });
    if let Some(candidates) = from_model {
        debug!(count = candidates.len(), "using model-emitted candidates");
        return candidates;
    }

    conversation
        .turns()
        .iter()
        .filter_map(|turn| match turn {
            Turn::ToolResult { tool, content, .. } => {
                let kind = ToolKind::parse(tool)?;
                if !kind.yields_candidates() || is_error_result(content) {
                    return None;
                }
                let payload = serde_json::from_str::<Value>(content).ok()?;
                Some(normalize_all(&payload, tool))
            }
            _ => None,
        })
        .flatten()
        .collect()
}

/// Parses the last well-formed JSON array in one model output.
///
/// Malformed fragments and empty arrays are skipped. Returns `None` when
/// the output holds no parseable, non-empty array of objects.
#[must_use]
pub fn model_candidates(content: &str) -> Option<Vec<Candidate>> {
    let trimmed = content.trim();
    let mut fragments: Vec<&str> = JSON_FENCE
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .collect()
        })
        .unwrap_or_default();
    if fragments.is_empty() && trimmed.starts_with('[') {
        fragments.push(trimmed);
    }

    fragments.into_iter().rev().find_map(|fragment| {
        let cleaned = strip_trailing_commas(fragment.trim());
        match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Array(items)) if !items.is_empty() && items.iter().all(Value::is_object) => {
                Some(normalize_all(&Value::Array(items), MODEL_SOURCE))
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "discarding malformed JSON fragment");
                None
            }
        }
    })
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA
        .as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, "$1").into_owned())
}

/// Collapses duplicates and keeps at most `cap` candidates.
///
/// Candidates without a usable title key are dropped. Each group keeps the
/// position of its first member; a later duplicate replaces the kept record
/// only when its priority is strictly higher.
#[must_use]
pub fn deduplicate(candidates: Vec<Candidate>, cap: usize) -> Vec<Candidate> {
    let mut kept: Vec<(Candidate, PublicationPriority)> = Vec::new();
    let mut index: HashMap<NormalizedTitle, usize> = HashMap::new();

    for candidate in candidates {
        let Some(key) = candidate.dedup_key() else {
            continue;
        };
        let priority = candidate.priority();
        match index.get(&key) {
            Some(&slot) => {
                if priority > kept[slot].1 {
                    kept[slot] = (candidate, priority);
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push((candidate, priority));
            }
        }
    }

    kept.into_iter().take(cap).map(|(c, _)| c).collect()
}
