//! Error types for paperfinder.
//!
//! Each layer owns its own error enum: [`AgentError`] for the reasoning
//! model and configuration, [`ToolError`] for tool execution, and
//! [`CommandError`] for the CLI. The top-level [`Error`] wraps all three.

use thiserror::Error;

/// Result type alias for paperfinder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Reasoning-model or configuration error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Tool execution error.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised by the reasoning-model layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the reasoning model.
    #[error(
        "API key missing: set OPENAI_API_KEY (or PAPERFINDER_API_KEY) in the environment or .env"
    )]
    ApiKeyMissing,

    /// The provider API returned an error.
    #[error("API request failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ApiRequest {
        /// Error message from the provider.
        message: String,
        /// HTTP status code, when known.
        status: Option<u16>,
    },

    /// The provider response could not be interpreted.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The offending content.
        content: String,
    },

    /// The configured provider name is unknown.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The query text was rejected before the loop started.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Reason for rejection.
        message: String,
    },
}

/// Errors raised while executing a tool.
///
/// These never escape the dispatch boundary: the registry renders them
/// into error-marker strings that are fed back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// The tool arguments did not match the tool's schema.
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Decoder message.
        message: String,
    },

    /// An upstream HTTP request failed.
    #[error("request to {url} failed: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Failure description.
        message: String,
    },

    /// The upstream service rate limited the request.
    #[error("rate limited by {service}")]
    RateLimited {
        /// Service name.
        service: String,
    },

    /// The requested record does not exist upstream.
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of record.
        what: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The tool cannot run in this environment.
    #[error("{name} unavailable: {reason}")]
    Unavailable {
        /// Tool or dependency name.
        name: String,
        /// Why it is unavailable.
        reason: String,
    },

    /// Local file I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The upstream payload could not be decoded.
    #[error("could not decode {what}: {message}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Decoder message.
        message: String,
    },

    /// The tool exceeded its time budget.
    #[error("{name} timed out after {secs}s")]
    Timeout {
        /// Tool name.
        name: String,
        /// Budget in seconds.
        secs: u64,
    },

    /// The tool task panicked.
    #[error("{name} failed unexpectedly: {message}")]
    Panicked {
        /// Tool name.
        name: String,
        /// Panic payload or join error.
        message: String,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
