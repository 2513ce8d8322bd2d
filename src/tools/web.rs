//! Web tools: Google Custom Search, page reading and URL extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;

use super::http::HttpClient;
use super::{misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::text::{collapse_whitespace, preview};
use crate::core::{Candidate, normalize};
use crate::error::ToolError;

const GOOGLE_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search returns at most ten results per page.
const GOOGLE_MAX: usize = 10;
/// Characters of page text returned to the model.
pub const PAGE_PREVIEW_CHARS: usize = 5000;
const TEXT_WIDTH: usize = 120;

static URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\)\]\}]+"#).ok());

/// A fetched web page reduced to text.
#[derive(Debug, Clone, Serialize)]
pub struct WebPage {
    /// Requested URL.
    pub url: String,
    /// Contents of `<title>`, if any.
    pub title: String,
    /// Text preview.
    pub content: String,
    /// Length of the full text in characters.
    pub length: usize,
}

/// Google search plus page reading.
#[derive(Debug, Clone)]
pub struct WebTools {
    http: HttpClient,
    google_api_key: Option<String>,
    google_cx: Option<String>,
}

impl WebTools {
    /// Creates the web tools. Google search is unavailable unless both the
    /// API key and the search engine id are set.
    #[must_use]
    pub const fn new(
        http: HttpClient,
        google_api_key: Option<String>,
        google_cx: Option<String>,
    ) -> Self {
        Self {
            http,
            google_api_key,
            google_cx,
        }
    }

    /// Runs a Google Custom Search query.
    pub async fn google_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Candidate>, ToolError> {
        let (Some(key), Some(cx)) = (&self.google_api_key, &self.google_cx) else {
            return Err(ToolError::Unavailable {
                name: ToolKind::GoogleSearch.as_str().to_string(),
                reason: "GOOGLE_SEARCH_API_KEY and GOOGLE_SEARCH_CX must be set".to_string(),
            });
        };
        let params = [
            ("key", key.clone()),
            ("cx", cx.clone()),
            ("q", query.to_string()),
            ("num", max_results.min(GOOGLE_MAX).to_string()),
        ];
        let body = self.http.get_json("google", GOOGLE_URL, &params, &[]).await?;
        Ok(search_items(&body))
    }

    /// Fetches a page and converts it to text.
    pub async fn read_webpage(&self, url: &str) -> Result<WebPage, ToolError> {
        let html = self.http.get_text("web", url, &[]).await?;
        Ok(page_from_html(url, &html))
    }
}

#[async_trait]
impl Tool for WebTools {
    fn kinds(&self) -> &'static [ToolKind] {
        &[
            ToolKind::GoogleSearch,
            ToolKind::ReadWebpage,
            ToolKind::ExtractUrlsFromText,
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::GoogleSearch(a) => to_json(&self.google_search(&a.query, a.limit()).await?),
            ToolArgs::ReadWebpage(a) => to_json(&self.read_webpage(&a.url).await?),
            ToolArgs::ExtractUrlsFromText(a) => to_json(&extract_urls(&a.text)),
            _ => Err(misrouted(&args)),
        }
    }
}

fn search_items(body: &Value) -> Vec<Candidate> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|i| normalize(i, "google")).collect())
        .unwrap_or_default()
}

/// Reduces an HTML document to a [`WebPage`].
#[must_use]
pub fn page_from_html(url: &str, html: &str) -> WebPage {
    let title = page_title(html).unwrap_or_default();
    let text = html_to_text(html);
    WebPage {
        url: url.to_string(),
        title,
        content: preview(&text, PAGE_PREVIEW_CHARS, "..."),
        length: text.chars().count(),
    }
}

/// Text of the document's `<title>`, with character references decoded.
fn page_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))?;
    (!title.is_empty()).then_some(title)
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => collapse_whitespace(html),
    }
}

/// Returns the unique `http(s)` URLs in `text`, in order of appearance.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    let Some(re) = URL.as_ref() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use test_case::test_case;

    #[test]
    fn test_extract_urls_dedups_and_trims() {
        let text = "See https://arxiv.org/abs/1706.03762. Also (https://aclanthology.org/N19-1423) \
                    and https://arxiv.org/abs/1706.03762 again, plus http://x.org/a,b";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://arxiv.org/abs/1706.03762",
                "https://aclanthology.org/N19-1423",
                "http://x.org/a,b",
            ]
        );
    }

    #[test]
    fn test_extract_urls_none() {
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_page_from_html() {
        let html = "<html><head><title>\n  A Paper </title></head>\
                    <body><h1>Heading</h1><p>Body text.</p></body></html>";
        let page = page_from_html("https://example.org", html);
        assert_eq!(page.title, "A Paper");
        assert!(page.content.contains("Body text."));
        assert_eq!(page.length, page.content.chars().count());
    }

    #[test_case("<title>Tom &amp; Jerry &#8211; A Study</title>", "Tom & Jerry – A Study" ; "entities")]
    #[test_case("<title>Schr&#246;dinger &#x2014; Notes</title>", "Schrödinger — Notes" ; "numeric")]
    #[test_case("<html><body><p>no title</p></body></html>", "" ; "missing")]
    fn test_page_title_decoded(html: &str, expected: &str) {
        assert_eq!(page_from_html("u", html).title, expected);
    }

    #[test]
    fn test_page_preview_truncates() {
        let body = "word ".repeat(3000);
        let page = page_from_html("u", &format!("<p>{body}</p>"));
        assert!(page.length > PAGE_PREVIEW_CHARS);
        assert!(page.content.ends_with("..."));
    }

    #[test]
    fn test_search_items_normalize() {
        let body = json!({"items": [
            {"title": "Attention Is All You Need", "link": "https://arxiv.org/abs/1706.03762",
             "snippet": "The dominant sequence transduction models..."}
        ]});
        let items = search_items(&body);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://arxiv.org/abs/1706.03762");
        assert_eq!(items[0].source, "google");
        assert!(search_items(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_google_search_requires_keys() {
        let http = HttpClient::new(Duration::from_secs(1), Duration::ZERO)
            .unwrap_or_else(|e| panic!("client: {e}"));
        let tools = WebTools::new(http, Some("key".to_string()), None);
        let err = tools.google_search("q", 3).await;
        assert!(matches!(err, Err(ToolError::Unavailable { .. })));
    }
}
