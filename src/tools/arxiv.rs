//! arXiv connector (Atom export API).

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};
use tracing::warn;

use super::http::HttpClient;
use super::{SearchProvider, misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::{Candidate, normalize};
use crate::core::text::collapse_whitespace;
use crate::error::ToolError;

const API_URL: &str = "https://export.arxiv.org/api/query";

/// Searches arXiv and resolves arXiv identifiers.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    http: HttpClient,
}

impl ArxivClient {
    /// Creates a client.
    #[must_use]
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Runs a relevance-sorted search.
    pub async fn try_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Candidate>, ToolError> {
        let params = [
            ("search_query", format!("all:{query}")),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", "relevance".to_string()),
        ];
        let feed = self.http.get_text("arxiv", API_URL, &params).await?;
        Ok(parse_feed(&feed))
    }

    /// Looks up one paper by arXiv id.
    pub async fn by_id(&self, arxiv_id: &str) -> Result<Vec<Candidate>, ToolError> {
        let id = clean_id(arxiv_id);
        let feed = self
            .http
            .get_text("arxiv", API_URL, &[("id_list", id.clone())])
            .await?;
        let papers = parse_feed(&feed);
        if papers.is_empty() {
            return Err(ToolError::NotFound {
                what: "arXiv paper",
                id,
            });
        }
        Ok(papers)
    }
}

#[async_trait]
impl SearchProvider for ArxivClient {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate> {
        self.try_search(query, max_results)
            .await
            .unwrap_or_else(|e| {
                warn!(provider = "arxiv", error = %e, "search failed");
                Vec::new()
            })
    }
}

#[async_trait]
impl Tool for ArxivClient {
    fn kinds(&self) -> &'static [ToolKind] {
        &[ToolKind::ArxivSearch, ToolKind::ArxivDirect]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::ArxivSearch(a) => to_json(&self.search(&a.query, a.limit()).await),
            ToolArgs::ArxivDirect(a) => to_json(&self.by_id(&a.arxiv_id).await?),
            _ => Err(misrouted(&args)),
        }
    }
}

/// Strips URL prefixes and whitespace from a user-supplied arXiv id.
fn clean_id(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .rsplit_once("/abs/")
        .or_else(|| raw.rsplit_once("/pdf/"))
        .map_or(raw, |(_, id)| id);
    let raw = raw.strip_prefix("arXiv:").unwrap_or(raw);
    raw.trim_end_matches(".pdf").to_string()
}

/// Parses an Atom feed into candidates.
///
/// Entries without an `/abs/` id (arXiv reports errors as entries) are
/// skipped. Character references, numeric ones included, are decoded by
/// the parser.
#[must_use]
pub fn parse_feed(feed: &str) -> Vec<Candidate> {
    let Ok(entry_selector) = Selector::parse("entry") else {
        return Vec::new();
    };
    let document = Html::parse_document(feed);
    document
        .select(&entry_selector)
        .filter_map(parse_entry)
        .map(|raw| normalize(&raw, "arxiv"))
        .collect()
}

fn parse_entry(entry: ElementRef<'_>) -> Option<Value> {
    let id_url = child_text(entry, "id")?;
    let (_, arxiv_id) = id_url.split_once("/abs/")?;

    let authors: Vec<String> = Selector::parse("author > name")
        .map(|sel| {
            entry
                .select(&sel)
                .map(element_text)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(json!({
        "title": child_text(entry, "title").unwrap_or_default(),
        "authors": authors,
        "summary": child_text(entry, "summary").unwrap_or_default(),
        "published": child_text(entry, "published").unwrap_or_default(),
        "url": id_url.replacen("http://", "https://", 1),
        "pdf_url": pdf_link(entry).unwrap_or_else(|| format!("https://arxiv.org/pdf/{arxiv_id}")),
        "journal": child_text(entry, "arxiv:journal_ref"),
        "doi": child_text(entry, "arxiv:doi"),
        "venue": "arXiv",
        "arxiv_id": arxiv_id,
        "source": "arxiv",
    }))
}

/// Returns the text of the first descendant element called `name`.
///
/// Matches on the element name directly so namespaced tags such as
/// `arxiv:doi` need no selector escaping.
fn child_text(entry: ElementRef<'_>, name: &str) -> Option<String> {
    let text = entry
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
        .map(element_text)?;
    (!text.is_empty()).then_some(text)
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn pdf_link(entry: ElementRef<'_>) -> Option<String> {
    entry
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "link")
        .find(|el| el.value().attr("title") == Some("pdf"))
        .and_then(|el| el.value().attr("href"))
        .map(|href| href.replacen("http://", "https://", 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex recurrent &amp; convolutional networks.
    </summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
    <arxiv:comment xmlns:arxiv="http://arxiv.org/schemas/atom">15 pages</arxiv:comment>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED);
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title, "Attention Is All You Need");
        assert_eq!(p.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(p.year, "2017");
        assert_eq!(p.venue, "arXiv");
        assert_eq!(p.url, "https://arxiv.org/abs/1706.03762v7");
        assert_eq!(p.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1706.03762v7"));
        assert_eq!(p.arxiv_id.as_deref(), Some("1706.03762v7"));
        assert_eq!(p.source, "arxiv");
        assert!(
            p.r#abstract
                .as_deref()
                .is_some_and(|a| a.starts_with("The dominant")
                    && a.contains("recurrent & convolutional"))
        );
    }

    #[test]
    fn test_parse_feed_empty() {
        assert!(parse_feed("<feed></feed>").is_empty());
        assert!(parse_feed("not xml at all").is_empty());
    }

    fn entry(title: &str) -> String {
        format!(
            "<feed><entry><id>http://arxiv.org/abs/2301.00001v1</id>\
             <published>2023-01-01T00:00:00Z</published>\
             <title>{title}</title><author><name>Erwin Schr&#246;dinger</name></author>\
             <arxiv:primary_category term=\"cs.LG\"/><category term=\"cs.LG\"/>\
             <arxiv:doi>10.1000/xyz&amp;1</arxiv:doi></entry></feed>"
        )
    }

    #[test_case("Tom &amp; Jerry", "Tom & Jerry" ; "named")]
    #[test_case("Schr&#246;dinger Bridges", "Schrödinger Bridges" ; "decimal")]
    #[test_case("Bridges &#x2014; Revisited", "Bridges — Revisited" ; "hex")]
    #[test_case("&lt;b&gt; Tags &quot;Quoted&quot;", "<b> Tags \"Quoted\"" ; "markup")]
    fn test_title_entities_decoded(raw: &str, expected: &str) {
        let papers = parse_feed(&entry(raw));
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, expected);
    }

    #[test]
    fn test_namespaced_fields_after_self_closing_tags() {
        let papers = parse_feed(&entry("Schr&#246;dinger Bridges Revisited"));
        let p = &papers[0];
        assert_eq!(p.authors, vec!["Erwin Schrödinger"]);
        assert_eq!(p.doi.as_deref(), Some("10.1000/xyz&1"));
        assert_eq!(p.arxiv_id.as_deref(), Some("2301.00001v1"));
    }

    #[test]
    fn test_entity_title_dedups_with_plain_title() {
        let arxiv = parse_feed(&entry("Schr&#246;dinger Bridges &#x2014; Revisited"));
        let plain = Candidate {
            title: "Schrödinger Bridges — Revisited".to_string(),
            venue: "NeurIPS 2023".to_string(),
            ..Candidate::default()
        };
        assert_eq!(arxiv[0].dedup_key(), plain.dedup_key());

        let mut all = arxiv;
        all.push(plain);
        let kept = crate::agent::aggregator::deduplicate(all, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].venue, "NeurIPS 2023");
    }

    #[test_case("1706.03762", "1706.03762" ; "bare")]
    #[test_case(" arXiv:1706.03762 ", "1706.03762" ; "prefixed")]
    #[test_case("https://arxiv.org/abs/1706.03762v2", "1706.03762v2" ; "abs url")]
    #[test_case("https://arxiv.org/pdf/1706.03762.pdf", "1706.03762" ; "pdf url")]
    #[test_case("cs/0112017", "cs/0112017" ; "old style")]
    fn test_clean_id(raw: &str, expected: &str) {
        assert_eq!(clean_id(raw), expected);
    }
}
