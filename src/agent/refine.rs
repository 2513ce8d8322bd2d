//! Refinement controller.
//!
//! After each aggregation the controller either accepts the rendered block
//! or asks the model for another pass. The decision is a [`Decision`]
//! value; the engine never inspects natural-language output to decide
//! whether to keep refining.

use std::sync::LazyLock;

use regex::Regex;

use super::aggregator::{Aggregation, ShortList};
use super::prompt::{PromptSet, fill_refinement};
use crate::core::Candidate;

/// Fenced citation blocks in model output.
static CITATION_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```bibtex[ \t]*\r?\n?(.*?)```").ok());

/// A BibTeX entry header such as `@inproceedings{`.
static ENTRY_HEADER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z]+\s*\{").ok());

/// Kind of follow-up requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementKind {
    /// Fetch and read the documents behind the shortlist.
    DocumentVerification,
    /// Review the citations for correctness only.
    Review,
}

impl RefinementKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocumentVerification => "document_verification",
            Self::Review => "review",
        }
    }
}

/// Outcome of one refinement decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Accept this text as the final answer.
    Complete(String),
    /// Send `instruction` to the model and loop.
    NeedsRefinement {
        /// Instruction turn for the model.
        instruction: String,
        /// Which follow-up was requested.
        kind: RefinementKind,
        /// Shortlist after enrichment.
        shortlist: ShortList,
    },
}

/// Decides whether an aggregation needs another pass.
#[derive(Debug, Clone)]
pub struct RefinementController<'a> {
    prompts: &'a PromptSet,
    max_refinements: usize,
}

impl<'a> RefinementController<'a> {
    /// Creates a controller allowing at most `max_refinements` rounds.
    #[must_use]
    pub const fn new(prompts: &'a PromptSet, max_refinements: usize) -> Self {
        Self {
            prompts,
            max_refinements,
        }
    }

    /// Decides what to do with `aggregation` after `rounds_used` rounds.
    ///
    /// An empty aggregation and an exhausted round budget both complete
    /// with the rendered text.
    #[must_use]
    pub fn decide(&self, aggregation: &Aggregation, rounds_used: usize) -> Decision {
        if aggregation.is_empty() || rounds_used >= self.max_refinements {
            return Decision::Complete(aggregation.rendered.clone());
        }

        let shortlist = enrich(&aggregation.shortlist);
        let (template, kind) = if shortlist.iter().any(has_document) {
            (
                &self.prompts.document_refinement,
                RefinementKind::DocumentVerification,
            )
        } else {
            (&self.prompts.review_refinement, RefinementKind::Review)
        };
        let shortlist_json =
            serde_json::to_string_pretty(&shortlist).unwrap_or_else(|_| "[]".to_string());

        Decision::NeedsRefinement {
            instruction: fill_refinement(template, &aggregation.rendered, &shortlist_json),
            kind,
            shortlist,
        }
    }
}

/// Fills in document URLs that can be derived from known identifiers.
///
/// arXiv candidates get their PDF link; ACL Anthology landing pages get the
/// `.pdf` variant. Returns a new list.
#[must_use]
pub fn enrich(shortlist: &ShortList) -> ShortList {
    shortlist.replaced_with(|c| {
        let has_pdf = c.pdf_url.as_deref().is_some_and(|u| !u.is_empty());
        if has_pdf {
            return c.clone();
        }
        let pdf_url = c
            .arxiv_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("https://arxiv.org/pdf/{id}"))
            .or_else(|| {
                (c.url.contains("aclanthology.org") && !c.url.ends_with(".pdf"))
                    .then(|| format!("{}.pdf", c.url.trim_end_matches('/')))
            });
        match pdf_url {
            Some(url) => Candidate {
                pdf_url: Some(url),
                ..c.clone()
            },
            None => c.clone(),
        }
    })
}

/// Returns `true` if the candidate exposes a fetchable document.
#[must_use]
pub fn has_document(candidate: &Candidate) -> bool {
    candidate
        .pdf_url
        .as_deref()
        .is_some_and(|u| !u.is_empty())
        || is_document_url(&candidate.url)
}

/// Returns `true` for URLs that point at (or directly resolve to) a PDF.
#[must_use]
pub fn is_document_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".pdf")
        || path.contains("/pdf/")
        || lower.contains("arxiv.org/")
        || lower.contains("aclanthology.org/")
        || lower.contains("openreview.net/pdf")
}

/// Extracts the last finished citation block from model output.
///
/// A block counts only when it is fenced as `bibtex` and holds at least
/// one entry header. The body is returned trimmed and otherwise verbatim.
#[must_use]
pub fn extract_citation_block(text: &str) -> Option<String> {
    let fence = CITATION_FENCE.as_ref()?;
    let header = ENTRY_HEADER.as_ref()?;
    fence
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| header.is_match(body))
        .last()
        .map(str::to_string)
}
