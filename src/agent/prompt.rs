//! System prompt, refinement templates and message builders.
//!
//! Templates are compiled in and can be overridden per file from a prompt
//! directory. Refinement templates use `{citations}` and `{shortlist}`
//! placeholders.

use std::fmt::Write;
use std::path::{Path, PathBuf};

/// System prompt for the reasoning model.
pub const SYSTEM_PROMPT: &str = r#"You are a research assistant that finds academic papers and returns them as BibTeX citations.

## Workflow

1. Choose search tools that fit the domain of the query.
2. Search, deduplicate and rank the results by relevance.
3. Prefer formal publications (conferences, journals) over preprints.
4. Finish each search phase with the filtered results as a JSON array.
5. When asked, download the PDFs and refine the citations from their actual content.

## Required Output Format

End your answer with the filtered results as JSON:
```json
[
  {
    "title": "Paper Title Here",
    "authors": ["Author One", "Author Two"],
    "year": "2024",
    "venue": "Conference Name",
    "url": "https://example.com",
    "pdf_url": "https://example.com/paper.pdf",
    "abstract": "Paper abstract here..."
  }
]
```

## Search Tools (priority order)

- CS/AI: dblp_search, then semantic_scholar_search, then arxiv_search
- NLP: dblp_search, then semantic_scholar_search
- Physics/Math: semantic_scholar_search, then arxiv_search
- Bio/Med: semantic_scholar_search
- Known identifiers: arxiv_direct, doi_search, semantic_scholar_paper_details
- Last resort: google_search, then read_webpage on promising hits

Semantic Scholar is rate limited. Prefer DBLP and arXiv when they cover the domain.
Semantic Scholar paper ids may be the S2 SHA, "CorpusId:<n>", "DOI:<doi>" or "ARXIV:<id>".

## Deduplication and Ranking

1. DEDUPLICATE: compare titles across sources. If the same paper appears as a conference paper and a preprint, keep only the formal publication.
2. RANK: order papers by relevance to the query.
3. FILTER: drop papers that are not clearly relevant. If nothing relevant was found, try a different search strategy.
4. CHOOSE: keep only the most appropriate papers.

Example: if "SciBench" appears in both ICML 2024 and arXiv 2023, keep only the ICML 2024 version.

Before finalizing, check that the results are not all arXiv preprints. For CS/AI papers, try dblp_search to find the formal venue.

## Documents

PDF tools work on local files: call download_file first, then read_pdf_text or extract_pdf_metadata on the returned path.

When the citations are final, output them in a ```bibtex code block."#;

/// Refinement instruction used when at least one citation has a document.
pub const DOCUMENT_REFINEMENT_PROMPT: &str = r"The search results have been converted to BibTeX. Review and refine these entries:

```bibtex
{citations}
```

Tasks:
1. Review the BibTeX entries for accuracy and completeness.
2. For papers with available PDFs, download them and refine the metadata from their content.

Papers with potential PDFs:
{shortlist}

For each paper with a PDF URL:
1. Use download_file to download the PDF.
2. Use read_pdf_text to extract its text.
3. Use extract_pdf_metadata to get the PDF metadata.
4. Correct the BibTeX entry from the actual content (title, authors, venue, year).

After refinement, output the final BibTeX entries in a ```bibtex code block.";

/// Refinement instruction used when no citation has a document.
pub const REVIEW_REFINEMENT_PROMPT: &str = r"The search results have been converted to BibTeX. Review these entries:

```bibtex
{citations}
```

Check the entries for accuracy and completeness. If they are correct, output the final BibTeX entries in a ```bibtex code block.";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/paperfinder/prompts";

/// Environment variable overriding the prompt directory.
pub const PROMPT_DIR_ENV: &str = "PAPERFINDER_PROMPT_DIR";

/// Filename for the system prompt template.
const SYSTEM_FILENAME: &str = "system.md";
/// Filename for the document refinement template.
const DOCUMENT_REFINEMENT_FILENAME: &str = "refine_documents.md";
/// Filename for the review refinement template.
const REVIEW_REFINEMENT_FILENAME: &str = "refine_review.md";

/// Prompt templates used by the engine.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the reasoning model.
    pub system: String,
    /// Refinement template asking for document verification.
    pub document_refinement: String,
    /// Refinement template asking for a correctness review.
    pub review_refinement: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `PAPERFINDER_PROMPT_DIR` environment variable
    /// 3. `~/.config/paperfinder/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            system: load_file(SYSTEM_FILENAME, SYSTEM_PROMPT),
            document_refinement: load_file(
                DOCUMENT_REFINEMENT_FILENAME,
                DOCUMENT_REFINEMENT_PROMPT,
            ),
            review_refinement: load_file(REVIEW_REFINEMENT_FILENAME, REVIEW_REFINEMENT_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            document_refinement: DOCUMENT_REFINEMENT_PROMPT.to_string(),
            review_refinement: REVIEW_REFINEMENT_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (SYSTEM_FILENAME, SYSTEM_PROMPT),
            (DOCUMENT_REFINEMENT_FILENAME, DOCUMENT_REFINEMENT_PROMPT),
            (REVIEW_REFINEMENT_FILENAME, REVIEW_REFINEMENT_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Fills a refinement template.
#[must_use]
pub fn fill_refinement(template: &str, citations: &str, shortlist_json: &str) -> String {
    template
        .replace("{citations}", citations)
        .replace("{shortlist}", shortlist_json)
}

/// Appends the "tools used so far" ledger to the system prompt.
///
/// Returns the prompt unchanged when no tool has been called yet.
#[must_use]
pub fn build_system_with_ledger(system: &str, used: &[String]) -> String {
    if used.is_empty() {
        return system.to_string();
    }
    let mut prompt = format!("{system}\n\nTOOLS USED SO FAR:\n");
    for line in used {
        let _ = writeln!(prompt, "- {line}");
    }
    prompt.push_str("Avoid repeating these calls unless a different argument is needed.");
    prompt
}

/// Builds the query for a follow-up question on earlier results.
#[must_use]
pub fn build_follow_up(previous_answer: &str, question: &str) -> String {
    format!("Previous results:\n{previous_answer}\n\nFollow-up question: {question}")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_not_empty() {
        assert!(!SYSTEM_PROMPT.is_empty());
        assert!(DOCUMENT_REFINEMENT_PROMPT.contains("{citations}"));
        assert!(DOCUMENT_REFINEMENT_PROMPT.contains("{shortlist}"));
        assert!(REVIEW_REFINEMENT_PROMPT.contains("{citations}"));
    }

    #[test]
    fn test_fill_refinement() {
        let out = fill_refinement(DOCUMENT_REFINEMENT_PROMPT, "@misc{a,}", "[{}]");
        assert!(out.contains("```bibtex\n@misc{a,}\n```"));
        assert!(out.contains("[{}]"));
        assert!(!out.contains("{citations}"));
    }

    #[test]
    fn test_ledger_empty_is_unchanged() {
        assert_eq!(build_system_with_ledger("sys", &[]), "sys");
    }

    #[test]
    fn test_ledger_lists_calls() {
        let used = vec![
            "dblp_search(query='bert')".to_string(),
            "arxiv_direct(arxiv_id='1810.04805')".to_string(),
        ];
        let prompt = build_system_with_ledger("sys", &used);
        assert!(prompt.starts_with("sys\n\nTOOLS USED SO FAR:\n"));
        assert!(prompt.contains("- dblp_search(query='bert')\n"));
        assert!(prompt.contains("- arxiv_direct(arxiv_id='1810.04805')\n"));
    }

    #[test]
    fn test_build_follow_up() {
        assert_eq!(
            build_follow_up("@misc{a}", "newer work?"),
            "Previous results:\n@misc{a}\n\nFollow-up question: newer work?"
        );
    }

    #[test]
    fn test_load_overrides_per_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join(SYSTEM_FILENAME), "custom system")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.system, "custom system");
        assert_eq!(prompts.review_refinement, REVIEW_REFINEMENT_PROMPT);
    }

    #[test]
    fn test_write_defaults_skips_existing() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join(SYSTEM_FILENAME), "keep me")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let written =
            PromptSet::write_defaults(dir.path()).unwrap_or_else(|e| panic!("write_defaults: {e}"));
        assert_eq!(written.len(), 2);
        let system = std::fs::read_to_string(dir.path().join(SYSTEM_FILENAME))
            .unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(system, "keep me");
    }
}
