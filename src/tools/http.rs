//! Shared HTTP client for scholarly APIs.
//!
//! Wraps a [`reqwest::Client`] with a per-request timeout and the
//! rate-limit policy: a `429` response pauses once for the configured
//! duration and then fails with [`ToolError::RateLimited`], which search
//! connectors turn into an empty result.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ToolError;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("PaperFinder/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by every connector.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    rate_limit_pause: Duration,
}

impl HttpClient {
    /// Builds a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Unavailable`] if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration, rate_limit_pause: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::Unavailable {
                name: "http".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            rate_limit_pause,
        })
    }

    /// Returns the underlying client for requests that need custom handling.
    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Sends a GET and decodes the JSON body.
    pub async fn get_json(
        &self,
        service: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Value, ToolError> {
        self.get_json_optional(service, url, query, headers)
            .await?
            .ok_or_else(|| ToolError::Http {
                url: url.to_string(),
                message: format!("HTTP {}", StatusCode::NOT_FOUND),
            })
    }

    /// Like [`get_json`](Self::get_json), but maps `404` to `Ok(None)`.
    pub async fn get_json_optional(
        &self,
        service: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Option<Value>, ToolError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let Some(response) = self.send(service, url, request).await? else {
            return Ok(None);
        };
        response
            .json::<Value>()
            .await
            .map(Some)
            .map_err(|e| ToolError::Decode {
                what: format!("{service} response"),
                message: e.to_string(),
            })
    }

    /// Sends a GET and returns the body as text.
    pub async fn get_text(
        &self,
        service: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, ToolError> {
        let request = self.client.get(url).query(query);
        let response = self
            .send(service, url, request)
            .await?
            .ok_or_else(|| ToolError::Http {
                url: url.to_string(),
                message: format!("HTTP {}", StatusCode::NOT_FOUND),
            })?;
        response.text().await.map_err(|e| ToolError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Sends a GET and returns the raw response after status checks.
    pub async fn get(&self, service: &str, url: &str) -> Result<Response, ToolError> {
        self.send(service, url, self.client.get(url))
            .await?
            .ok_or_else(|| ToolError::Http {
                url: url.to_string(),
                message: format!("HTTP {}", StatusCode::NOT_FOUND),
            })
    }

    async fn send(
        &self,
        service: &str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Option<Response>, ToolError> {
        debug!(service, url, "sending request");
        let response = request.send().await.map_err(|e| ToolError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(
                    service,
                    pause_secs = self.rate_limit_pause.as_secs_f64(),
                    "rate limited, pausing"
                );
                tokio::time::sleep(self.rate_limit_pause).await;
                Err(ToolError::RateLimited {
                    service: service.to_string(),
                })
            }
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(ToolError::Http {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_crate_version() {
        assert!(USER_AGENT.starts_with("PaperFinder/"));
        assert!(USER_AGENT.len() > "PaperFinder/".len());
    }

    #[test]
    fn test_client_builds() {
        let client = HttpClient::new(Duration::from_secs(1), Duration::from_millis(10));
        assert!(client.is_ok());
    }
}
