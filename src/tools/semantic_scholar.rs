//! Semantic Scholar Graph API connector.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::http::HttpClient;
use super::{SearchProvider, misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::{Candidate, normalize, normalize_all};
use crate::error::ToolError;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const PAPER_FIELDS: &str =
    "paperId,title,authors,abstract,year,venue,externalIds,publicationDate,openAccessPdf,url";
const AUTHOR_FIELDS: &str = "authorId,name,affiliations,paperCount,citationCount,hIndex,url";
/// Largest page size the search endpoint accepts.
const MAX_LIMIT: usize = 100;

/// Semantic Scholar client. Sends `x-api-key` when a key is configured.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    http: HttpClient,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    /// Creates a client.
    #[must_use]
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|k| ("x-api-key", k.clone()))
            .collect()
    }

    /// Paper keyword search.
    pub async fn search_papers(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Candidate>, ToolError> {
        let params = [
            ("query", query.to_string()),
            ("limit", max_results.min(MAX_LIMIT).to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        let url = format!("{BASE_URL}/paper/search");
        let body = self
            .http
            .get_json("semantic_scholar", &url, &params, &self.headers())
            .await?;
        Ok(data(&body)
            .map(|d| normalize_all(d, "semantic_scholar"))
            .unwrap_or_default())
    }

    /// Author search. Returns raw author records.
    pub async fn search_authors(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Value, ToolError> {
        let params = [
            ("query", query.to_string()),
            ("limit", max_results.min(MAX_LIMIT).to_string()),
            ("fields", AUTHOR_FIELDS.to_string()),
        ];
        let url = format!("{BASE_URL}/author/search");
        let body = self
            .http
            .get_json("semantic_scholar", &url, &params, &self.headers())
            .await?;
        Ok(data(&body).cloned().unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// Fetches one paper by Semantic Scholar id (or a prefixed id such as
    /// `DOI:...` or `ARXIV:...`).
    pub async fn paper(&self, paper_id: &str) -> Result<Candidate, ToolError> {
        let id = paper_id.trim();
        let url = format!("{BASE_URL}/paper/{id}");
        let params = [("fields", PAPER_FIELDS.to_string())];
        self.http
            .get_json_optional("semantic_scholar", &url, &params, &self.headers())
            .await?
            .map(|record| normalize(&record, "semantic_scholar"))
            .ok_or_else(|| ToolError::NotFound {
                what: "Semantic Scholar paper",
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl SearchProvider for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate> {
        self.search_papers(query, max_results)
            .await
            .unwrap_or_else(|e| {
                warn!(provider = "semantic_scholar", error = %e, "search failed");
                Vec::new()
            })
    }
}

#[async_trait]
impl Tool for SemanticScholarClient {
    fn kinds(&self) -> &'static [ToolKind] {
        &[
            ToolKind::SemanticScholarSearch,
            ToolKind::SemanticScholarSearchAuthors,
            ToolKind::SemanticScholarPaperDetails,
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::SemanticScholarSearch(a) => {
                to_json(&self.search(&a.query, a.limit()).await)
            }
            ToolArgs::SemanticScholarSearchAuthors(a) => {
                to_json(&self.search_authors(&a.query, a.limit()).await?)
            }
            ToolArgs::SemanticScholarPaperDetails(a) => to_json(&[self.paper(&a.paper_id).await?]),
            _ => Err(misrouted(&args)),
        }
    }
}

fn data(body: &Value) -> Option<&Value> {
    body.get("data").filter(|d| d.is_array())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn http() -> HttpClient {
        HttpClient::new(Duration::from_secs(1), Duration::ZERO)
            .unwrap_or_else(|e| panic!("client: {e}"))
    }

    #[test]
    fn test_search_response_normalizes() {
        let body = json!({"total": 1, "offset": 0, "data": [{
            "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
            "title": "Attention is All you Need",
            "authors": [{"authorId": "1", "name": "Ashish Vaswani"}],
            "year": 2017,
            "venue": "Neural Information Processing Systems",
            "externalIds": {"ArXiv": "1706.03762", "DOI": "10.5555/3295222"},
            "openAccessPdf": null,
            "url": "https://www.semanticscholar.org/paper/204e"
        }]});
        let papers = data(&body)
            .map(|d| normalize_all(d, "semantic_scholar"))
            .unwrap_or_default();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.year, "2017");
        assert_eq!(p.arxiv_id.as_deref(), Some("1706.03762"));
        assert_eq!(p.doi.as_deref(), Some("10.5555/3295222"));
        assert_eq!(
            p.paper_id.as_deref(),
            Some("204e3073870fae3d05bcbc2f6a8e263d9b72e776")
        );
        assert!(p.pdf_url.is_none());
    }

    #[test]
    fn test_data_requires_array() {
        assert!(data(&json!({"total": 0})).is_none());
        assert!(data(&json!({"data": "oops"})).is_none());
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let client = SemanticScholarClient::new(http(), Some("  ".to_string()));
        assert!(client.headers().is_empty());

        let client = SemanticScholarClient::new(http(), Some("k".to_string()));
        assert_eq!(client.headers(), vec![("x-api-key", "k".to_string())]);
    }
}
