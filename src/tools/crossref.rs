//! CrossRef DOI resolution.

use async_trait::async_trait;

use super::http::HttpClient;
use super::{misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::{Candidate, normalize};
use crate::error::ToolError;

const WORKS_URL: &str = "https://api.crossref.org/works";

/// Resolves DOIs against the CrossRef works endpoint.
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    http: HttpClient,
}

impl CrossrefClient {
    /// Creates a client.
    #[must_use]
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Looks up a DOI. Accepts bare DOIs and `doi.org` URLs.
    pub async fn resolve(&self, doi: &str) -> Result<Candidate, ToolError> {
        let doi = clean_doi(doi);
        if doi.is_empty() {
            return Err(ToolError::InvalidArguments {
                name: ToolKind::DoiSearch.as_str().to_string(),
                message: "empty DOI".to_string(),
            });
        }
        let url = format!("{WORKS_URL}/{doi}");
        let body = self
            .http
            .get_json_optional("crossref", &url, &[], &[])
            .await?
            .ok_or_else(|| ToolError::NotFound {
                what: "DOI",
                id: doi.clone(),
            })?;
        let message = body.get("message").ok_or_else(|| ToolError::Decode {
            what: "crossref response".to_string(),
            message: "missing `message`".to_string(),
        })?;
        Ok(normalize(message, "crossref"))
    }
}

#[async_trait]
impl Tool for CrossrefClient {
    fn kinds(&self) -> &'static [ToolKind] {
        &[ToolKind::DoiSearch]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::DoiSearch(a) => to_json(&[self.resolve(&a.doi).await?]),
            _ => Err(misrouted(&args)),
        }
    }
}

fn clean_doi(raw: &str) -> String {
    let raw = raw.trim();
    ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|p| raw.strip_prefix(p))
        .unwrap_or(raw)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("10.1000/xyz", "10.1000/xyz" ; "bare")]
    #[test_case(" https://doi.org/10.1000/xyz ", "10.1000/xyz" ; "resolver url")]
    #[test_case("doi:10.1000/xyz", "10.1000/xyz" ; "scheme")]
    #[test_case("   ", "" ; "blank")]
    fn test_clean_doi(raw: &str, expected: &str) {
        assert_eq!(clean_doi(raw), expected);
    }

    #[test]
    fn test_work_message_normalizes() {
        let message = json!({
            "DOI": "10.18653/v1/N19-1423",
            "title": ["BERT: Pre-training of Deep Bidirectional Transformers"],
            "author": [{"given": "Jacob", "family": "Devlin"}],
            "container-title": ["Proceedings of NAACL"],
            "issued": {"date-parts": [[2019, 6]]},
            "URL": "http://dx.doi.org/10.18653/v1/N19-1423"
        });
        let c = normalize(&message, "crossref");
        assert_eq!(c.doi.as_deref(), Some("10.18653/v1/N19-1423"));
        assert_eq!(c.authors, vec!["Jacob Devlin"]);
        assert_eq!(c.year, "2019");
        assert_eq!(c.venue, "Proceedings of NAACL");
        assert_eq!(c.source, "crossref");
    }
}
