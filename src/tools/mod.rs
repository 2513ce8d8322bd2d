//! Tool implementations: scholarly search connectors and document utilities.
//!
//! Search connectors implement [`SearchProvider`], whose contract is that a
//! search never fails: upstream errors, including rate limiting, yield an
//! empty list. Each connector also implements [`Tool`] so the registry can
//! dispatch to it; search tools return normalized candidates as a JSON
//! array.

pub mod arxiv;
pub mod crossref;
pub mod dblp;
pub mod documents;
pub mod http;
pub mod semantic_scholar;
pub mod web;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use arxiv::ArxivClient;
pub use crossref::CrossrefClient;
pub use dblp::DblpClient;
pub use documents::DocumentTools;
pub use http::HttpClient;
pub use semantic_scholar::SemanticScholarClient;
pub use web::WebTools;

use crate::agent::config::AgentConfig;
use crate::agent::registry::ToolRegistry;
use crate::agent::tool::ToolArgs;
use crate::core::Candidate;
use crate::error::ToolError;

/// A scholarly search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Searches for papers. Returns an empty list on any failure.
    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate>;
}

/// Builds a registry holding every tool in the catalogue.
///
/// # Errors
///
/// Returns [`ToolError::Unavailable`] if the HTTP client cannot be built.
pub fn standard_registry(config: &AgentConfig) -> Result<ToolRegistry, ToolError> {
    let http = HttpClient::new(config.tool_timeout, config.rate_limit_pause)?;

    Ok(ToolRegistry::new(config.tool_timeout)
        .with(Arc::new(ArxivClient::new(http.clone())))
        .with(Arc::new(DblpClient::new(http.clone())))
        .with(Arc::new(SemanticScholarClient::new(
            http.clone(),
            config.semantic_scholar_api_key.clone(),
        )))
        .with(Arc::new(CrossrefClient::new(http.clone())))
        .with(Arc::new(WebTools::new(
            http.clone(),
            config.google_api_key.clone(),
            config.google_cx.clone(),
        )))
        .with(Arc::new(DocumentTools::new(http, config.download_dir.clone()))))
}

/// Serializes a tool payload as pretty JSON.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(|e| ToolError::Decode {
        what: "tool output".to_string(),
        message: e.to_string(),
    })
}

/// Error for arguments routed to a tool that does not serve them.
pub(crate) fn misrouted(args: &ToolArgs) -> ToolError {
    ToolError::UnknownTool {
        name: args.kind().as_str().to_string(),
    }
}
