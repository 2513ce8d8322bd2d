//! Result normalizer.
//!
//! Maps a raw provider record (arbitrary JSON object) into a [`Candidate`].
//! Each semantic field is read from a fixed precedence list of keys so that
//! "venue" vs "booktitle" vs "journal" and similar differences between
//! providers are absorbed here. Normalization never fails: missing or
//! malformed fields default to empty values.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::candidate::Candidate;
use super::text::collapse_whitespace;

/// Title keys, highest precedence first.
const TITLE_KEYS: &[&str] = &["title"];
/// Author list keys.
const AUTHOR_KEYS: &[&str] = &["authors", "author"];
/// Keys that may carry a year or a date containing one.
const YEAR_KEYS: &[&str] = &[
    "year",
    "published",
    "publicationDate",
    "publication_date",
    "issued",
];
/// Venue keys.
const VENUE_KEYS: &[&str] = &["venue", "booktitle", "journal", "container-title"];
/// Landing page keys.
const URL_KEYS: &[&str] = &["url", "URL", "link", "entry_id", "ee"];
/// Direct PDF keys.
const PDF_KEYS: &[&str] = &["pdf_url", "openAccessPdf"];
/// Abstract keys.
const ABSTRACT_KEYS: &[&str] = &["abstract", "summary", "snippet"];
/// DOI keys.
const DOI_KEYS: &[&str] = &["doi", "DOI"];
/// arXiv id keys.
const ARXIV_KEYS: &[&str] = &["arxiv_id", "arxivId"];
/// Provider paper id keys.
const PAPER_ID_KEYS: &[&str] = &["paper_id", "paperId"];

static YEAR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").ok());

/// Normalizes one raw provider record.
///
/// `default_source` tags the candidate when the record does not name its
/// own source.
#[must_use]
pub fn normalize(raw: &Value, default_source: &str) -> Candidate {
    let Some(obj) = raw.as_object() else {
        return Candidate {
            source: default_source.to_string(),
            ..Candidate::default()
        };
    };

    let external = obj.get("externalIds").and_then(Value::as_object);

    Candidate {
        title: first_text(obj, TITLE_KEYS).unwrap_or_default(),
        authors: authors(obj),
        year: year(obj),
        venue: first_text(obj, VENUE_KEYS).unwrap_or_default(),
        journal: first_text(obj, &["journal"]),
        url: first_text(obj, URL_KEYS).unwrap_or_default(),
        pdf_url: first_text(obj, PDF_KEYS),
        r#abstract: first_text(obj, ABSTRACT_KEYS),
        source: first_text(obj, &["source"]).unwrap_or_else(|| default_source.to_string()),
        doi: first_text(obj, DOI_KEYS).or_else(|| external.and_then(|e| first_text(e, &["DOI"]))),
        arxiv_id: first_text(obj, ARXIV_KEYS)
            .or_else(|| external.and_then(|e| first_text(e, &["ArXiv"]))),
        paper_id: first_text(obj, PAPER_ID_KEYS),
    }
}

/// Normalizes every object found in a JSON payload.
///
/// Accepts an array of records or a single record; anything else yields
/// nothing.
#[must_use]
pub fn normalize_all(payload: &Value, default_source: &str) -> Vec<Candidate> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter(|v| v.is_object())
            .map(|v| normalize(v, default_source))
            .collect(),
        Value::Object(_) => vec![normalize(payload, default_source)],
        _ => Vec::new(),
    }
}

/// Returns the first non-empty textual value among `keys`.
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(as_text)
        .map(|s| collapse_whitespace(&s))
        .find(|s| !s.is_empty())
}

/// Reads a scalar-ish value as text.
///
/// Arrays yield their first textual element; objects yield their `url`,
/// `name` or `text` member.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(as_text),
        Value::Object(o) => ["url", "name", "text"]
            .iter()
            .find_map(|k| o.get(*k).and_then(as_text)),
        Value::Null | Value::Bool(_) => None,
    }
}

fn authors(obj: &Map<String, Value>) -> Vec<String> {
    AUTHOR_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .map(author_list)
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

fn author_list(value: &Value) -> Vec<String> {
    let names: Vec<String> = match value {
        Value::String(s) => s.split(" and ").map(str::to_string).collect(),
        Value::Array(items) => items.iter().filter_map(author_name).collect(),
        // DBLP wraps the list as {"author": [...]}, or a single author object.
        Value::Object(o) => match o.get("author") {
            Some(inner) => return author_list(inner),
            None => author_name(value).into_iter().collect(),
        },
        _ => Vec::new(),
    };
    names
        .iter()
        .map(|n| collapse_whitespace(n))
        .filter(|n| !n.is_empty())
        .collect()
}

fn author_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => {
            if let Some(name) = o.get("name").or_else(|| o.get("text")).and_then(as_text) {
                return Some(name);
            }
            let given = o.get("given").and_then(as_text).unwrap_or_default();
            let family = o.get("family").and_then(as_text).unwrap_or_default();
            let joined = format!("{given} {family}");
            let joined = joined.trim();
            (!joined.is_empty()).then(|| joined.to_string())
        }
        _ => None,
    }
}

fn year(obj: &Map<String, Value>) -> String {
    YEAR_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(year_of)
        .unwrap_or_default()
}

fn year_of(value: &Value) -> Option<String> {
    match value {
        // CrossRef dates: {"date-parts": [[2017, 12, 4]]}
        Value::Object(o) => o.get("date-parts").and_then(year_of),
        Value::Array(items) => items.iter().find_map(year_of),
        other => {
            let text = as_text(other)?;
            YEAR_RE
                .as_ref()?
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_dblp_record() {
        let raw = json!({
            "title": "Attention is All you Need.",
            "authors": {"author": [
                {"@pid": "1", "text": "Ashish Vaswani"},
                {"@pid": "2", "text": "Noam Shazeer"}
            ]},
            "venue": "NIPS",
            "year": "2017",
            "ee": "https://proceedings.neurips.cc/paper/7181"
        });
        let c = normalize(&raw, "dblp");
        assert_eq!(c.title, "Attention is All you Need.");
        assert_eq!(c.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(c.venue, "NIPS");
        assert_eq!(c.year, "2017");
        assert_eq!(c.url, "https://proceedings.neurips.cc/paper/7181");
        assert_eq!(c.source, "dblp");
    }

    #[test]
    fn test_normalize_dblp_single_author_object() {
        let raw = json!({
            "title": "A single author paper title",
            "authors": {"author": {"@pid": "1", "text": "Ada Lovelace"}}
        });
        assert_eq!(normalize(&raw, "dblp").authors, vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_normalize_semantic_scholar_record() {
        let raw = json!({
            "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
            "title": "Attention is All you Need",
            "authors": [{"authorId": "40348417", "name": "Ashish Vaswani"}],
            "year": 2017,
            "venue": "Neural Information Processing Systems",
            "externalIds": {"ArXiv": "1706.03762", "DOI": "10.5555/3295222"},
            "openAccessPdf": {"url": "https://arxiv.org/pdf/1706.03762"}
        });
        let c = normalize(&raw, "semantic_scholar");
        assert_eq!(c.year, "2017");
        assert_eq!(c.arxiv_id.as_deref(), Some("1706.03762"));
        assert_eq!(c.doi.as_deref(), Some("10.5555/3295222"));
        assert_eq!(c.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1706.03762"));
        assert_eq!(
            c.paper_id.as_deref(),
            Some("204e3073870fae3d05bcbc2f6a8e263d9b72e776")
        );
    }

    #[test]
    fn test_normalize_crossref_record() {
        let raw = json!({
            "title": ["Deep Residual Learning for Image Recognition"],
            "author": [{"given": "Kaiming", "family": "He"}],
            "container-title": ["2016 IEEE Conference on Computer Vision and Pattern Recognition (CVPR)"],
            "issued": {"date-parts": [[2016, 6]]},
            "DOI": "10.1109/cvpr.2016.90",
            "URL": "https://doi.org/10.1109/cvpr.2016.90"
        });
        let c = normalize(&raw, "crossref");
        assert_eq!(c.title, "Deep Residual Learning for Image Recognition");
        assert_eq!(c.authors, vec!["Kaiming He"]);
        assert_eq!(c.year, "2016");
        assert!(c.venue.contains("CVPR"));
        assert_eq!(c.doi.as_deref(), Some("10.1109/cvpr.2016.90"));
        assert_eq!(c.url, "https://doi.org/10.1109/cvpr.2016.90");
    }

    #[test]
    fn test_normalize_arxiv_shape() {
        let raw = json!({
            "title": "Attention Is All\n  You Need",
            "authors": ["Ashish Vaswani", "Noam Shazeer"],
            "summary": "The dominant sequence transduction models...",
            "published": "2017-06-12T17:57:34Z",
            "url": "http://arxiv.org/abs/1706.03762v7",
            "pdf_url": "http://arxiv.org/pdf/1706.03762v7",
            "arxiv_id": "1706.03762v7",
            "source": "arxiv"
        });
        let c = normalize(&raw, "model");
        assert_eq!(c.title, "Attention Is All You Need");
        assert_eq!(c.year, "2017");
        assert_eq!(c.source, "arxiv");
        assert!(c.r#abstract.is_some());
    }

    #[test]
    fn test_venue_precedence() {
        let raw = json!({"booktitle": "Proceedings of X", "journal": "J. Y"});
        let c = normalize(&raw, "t");
        assert_eq!(c.venue, "Proceedings of X");
        assert_eq!(c.journal.as_deref(), Some("J. Y"));
    }

    #[test]
    fn test_normalize_tolerates_garbage() {
        let c = normalize(&json!(42), "x");
        assert!(c.title.is_empty());
        assert_eq!(c.source, "x");

        let c = normalize(&json!({"title": null, "authors": 7, "year": "n.d."}), "x");
        assert!(c.title.is_empty());
        assert!(c.authors.is_empty());
        assert!(c.year.is_empty());
    }

    #[test]
    fn test_author_string_split() {
        let c = normalize(&json!({"authors": "A. One and B. Two"}), "x");
        assert_eq!(c.authors, vec!["A. One", "B. Two"]);
    }

    #[test]
    fn test_normalize_all() {
        let payload = json!([{"title": "one"}, "skip", {"title": "two"}]);
        assert_eq!(normalize_all(&payload, "x").len(), 2);
        assert_eq!(normalize_all(&json!({"title": "one"}), "x").len(), 1);
        assert!(normalize_all(&json!("text"), "x").is_empty());
    }

    #[test]
    fn test_normalize_round_trips_candidate_json() {
        let raw = json!({
            "title": "Attention Is All You Need",
            "authors": ["Ashish Vaswani"],
            "year": "2017",
            "venue": "NeurIPS 2017",
            "url": "https://papers.nips.cc/paper/7181",
            "source": "dblp"
        });
        let c = normalize(&raw, "model");
        let again = normalize(&serde_json::to_value(&c).unwrap_or_default(), "model");
        assert_eq!(c, again);
    }
}
