//! DBLP connector: publications, authors and venues.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::http::HttpClient;
use super::{SearchProvider, misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::{Candidate, normalize};
use crate::error::ToolError;

const BASE_URL: &str = "https://dblp.org/search";

/// DBLP search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DblpIndex {
    /// Publication records.
    Publications,
    /// Author profiles.
    Authors,
    /// Conferences and journals.
    Venues,
}

impl DblpIndex {
    const fn path(self) -> &'static str {
        match self {
            Self::Publications => "publ",
            Self::Authors => "author",
            Self::Venues => "venue",
        }
    }
}

/// DBLP search client.
#[derive(Debug, Clone)]
pub struct DblpClient {
    http: HttpClient,
}

impl DblpClient {
    /// Creates a client.
    #[must_use]
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Queries one DBLP index and returns the raw `info` records.
    pub async fn query(
        &self,
        index: DblpIndex,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Value>, ToolError> {
        let url = format!("{BASE_URL}/{}/api", index.path());
        let params = [
            ("q", query.to_string()),
            ("format", "json".to_string()),
            ("h", max_results.to_string()),
            ("c", "10".to_string()),
        ];
        let body = self.http.get_json("dblp", &url, &params, &[]).await?;
        Ok(hits(&body))
    }
}

#[async_trait]
impl SearchProvider for DblpClient {
    fn name(&self) -> &'static str {
        "dblp"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate> {
        match self.query(DblpIndex::Publications, query, max_results).await {
            Ok(records) => records.iter().map(|r| normalize(r, "dblp")).collect(),
            Err(e) => {
                warn!(provider = "dblp", error = %e, "search failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Tool for DblpClient {
    fn kinds(&self) -> &'static [ToolKind] {
        &[
            ToolKind::DblpSearch,
            ToolKind::DblpSearchAuthors,
            ToolKind::DblpSearchVenues,
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::DblpSearch(a) => to_json(&self.search(&a.query, a.limit()).await),
            ToolArgs::DblpSearchAuthors(a) => {
                to_json(&self.query(DblpIndex::Authors, &a.query, a.limit()).await?)
            }
            ToolArgs::DblpSearchVenues(a) => {
                to_json(&self.query(DblpIndex::Venues, &a.query, a.limit()).await?)
            }
            _ => Err(misrouted(&args)),
        }
    }
}

/// Extracts `result.hits.hit[].info` from a DBLP response.
fn hits(body: &Value) -> Vec<Value> {
    body.pointer("/result/hits/hit")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|h| h.get("info"))
                .filter(|info| info.is_object())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
