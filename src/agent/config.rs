//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default reasoning model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.1;
/// Default maximum completion tokens per model turn.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Iteration Guard ceiling: model turns allowed per query.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;
/// Aggregate→refine round trips allowed per query.
pub const DEFAULT_MAX_REFINEMENTS: usize = 2;
/// Maximum shortlist size.
pub const DEFAULT_SHORTLIST_SIZE: usize = 5;
/// Default per-tool time budget in seconds.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 15;
/// Default model request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
/// Pause after an upstream rate-limit response, in seconds.
const DEFAULT_RATE_LIMIT_PAUSE_SECS: u64 = 2;
/// Default download directory.
const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
/// Default session log directory.
const DEFAULT_LOG_DIR: &str = "logs";

/// Configuration for the paper-finding engine and its tools.
#[derive(Clone)]
pub struct AgentConfig {
    /// Reasoning-model provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Reasoning model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion tokens per model turn.
    pub max_tokens: u32,
    /// Iteration Guard ceiling.
    pub max_iterations: usize,
    /// Maximum refinement rounds before the rendered block is accepted.
    pub max_refinements: usize,
    /// Maximum number of citations in the final answer.
    pub shortlist_size: usize,
    /// Time budget for each tool call.
    pub tool_timeout: Duration,
    /// Time budget for each model call.
    pub request_timeout: Duration,
    /// Pause applied once after an upstream rate-limit response.
    pub rate_limit_pause: Duration,
    /// Directory for downloaded documents.
    pub download_dir: PathBuf,
    /// Directory for session logs.
    pub log_dir: PathBuf,
    /// Directory containing prompt template files.
    ///
    /// When set, the system prompt is loaded from this directory, falling
    /// back to the compiled-in default when the file is missing.
    pub prompt_dir: Option<PathBuf>,
    /// Semantic Scholar API key (raises the rate limit).
    pub semantic_scholar_api_key: Option<String>,
    /// Google Custom Search API key.
    pub google_api_key: Option<String>,
    /// Google Custom Search engine id.
    pub google_cx: Option<String>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field("max_refinements", &self.max_refinements)
            .field("shortlist_size", &self.shortlist_size)
            .field("tool_timeout", &self.tool_timeout)
            .field("download_dir", &self.download_dir)
            .field("log_dir", &self.log_dir)
            .field("prompt_dir", &self.prompt_dir)
            .finish_non_exhaustive()
    }
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_iterations: Option<usize>,
    max_refinements: Option<usize>,
    shortlist_size: Option<usize>,
    tool_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    rate_limit_pause: Option<Duration>,
    download_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    semantic_scholar_api_key: Option<String>,
    google_api_key: Option<String>,
    google_cx: Option<String>,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = env_string("PAPERFINDER_PROVIDER");
        }
        if self.api_key.is_none() {
            self.api_key =
                env_string("OPENAI_API_KEY").or_else(|| env_string("PAPERFINDER_API_KEY"));
        }
        if self.base_url.is_none() {
            self.base_url = env_string("OPENAI_BASE_URL");
        }
        if self.model.is_none() {
            self.model = env_string("PAPERFINDER_MODEL");
        }
        if self.temperature.is_none() {
            self.temperature = env_parse("PAPERFINDER_TEMPERATURE");
        }
        if self.max_tokens.is_none() {
            self.max_tokens = env_parse("PAPERFINDER_MAX_TOKENS");
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("PAPERFINDER_MAX_ITERATIONS");
        }
        if self.max_refinements.is_none() {
            self.max_refinements = env_parse("PAPERFINDER_MAX_REFINEMENTS");
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout =
                env_parse::<u64>("PAPERFINDER_TOOL_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.download_dir.is_none() {
            self.download_dir = env_string("PAPERFINDER_DOWNLOAD_DIR").map(PathBuf::from);
        }
        if self.log_dir.is_none() {
            self.log_dir = env_string("PAPERFINDER_LOG_DIR").map(PathBuf::from);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env_string("PAPERFINDER_PROMPT_DIR").map(PathBuf::from);
        }
        if self.semantic_scholar_api_key.is_none() {
            self.semantic_scholar_api_key = env_string("SEMANTIC_SCHOLAR_API_KEY");
        }
        if self.google_api_key.is_none() {
            self.google_api_key = env_string("GOOGLE_SEARCH_API_KEY");
        }
        if self.google_cx.is_none() {
            self.google_cx = env_string("GOOGLE_SEARCH_CX");
        }
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the reasoning model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the maximum completion tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the Iteration Guard ceiling.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the maximum refinement rounds.
    #[must_use]
    pub const fn max_refinements(mut self, n: usize) -> Self {
        self.max_refinements = Some(n);
        self
    }

    /// Sets the shortlist size.
    #[must_use]
    pub const fn shortlist_size(mut self, n: usize) -> Self {
        self.shortlist_size = Some(n);
        self
    }

    /// Sets the per-tool time budget.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the model request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Sets the pause applied after a rate-limit response.
    #[must_use]
    pub const fn rate_limit_pause(mut self, duration: Duration) -> Self {
        self.rate_limit_pause = Some(duration);
        self
    }

    /// Sets the download directory.
    #[must_use]
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Sets the session log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the Semantic Scholar API key.
    #[must_use]
    pub fn semantic_scholar_api_key(mut self, key: impl Into<String>) -> Self {
        self.semantic_scholar_api_key = Some(key.into());
        self
    }

    /// Sets the Google Custom Search credentials.
    #[must_use]
    pub fn google_search(mut self, api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        self.google_api_key = Some(api_key.into());
        self.google_cx = Some(cx.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            max_refinements: self.max_refinements.unwrap_or(DEFAULT_MAX_REFINEMENTS),
            shortlist_size: self
                .shortlist_size
                .unwrap_or(DEFAULT_SHORTLIST_SIZE)
                .max(1),
            tool_timeout: self
                .tool_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            rate_limit_pause: self
                .rate_limit_pause
                .unwrap_or(Duration::from_secs(DEFAULT_RATE_LIMIT_PAUSE_SECS)),
            download_dir: self
                .download_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            log_dir: self
                .log_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            prompt_dir: self.prompt_dir,
            semantic_scholar_api_key: self.semantic_scholar_api_key,
            google_api_key: self.google_api_key,
            google_cx: self.google_cx,
        })
    }
}
