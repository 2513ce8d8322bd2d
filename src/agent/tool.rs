//! Tool definitions, calls, and typed per-tool arguments.
//!
//! Every tool the model may call is listed in [`ToolKind`], and its
//! arguments are a dedicated struct in [`ToolArgs`]. The JSON schema sent
//! to the model is derived from those structs, so the set of accepted
//! arguments for each tool is known statically and validated before
//! dispatch.

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ToolError;

/// Prefix of every tool result that reports a failure.
pub const ERROR_MARKER: &str = "Error:";

/// Default result count for search tools.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Upper bound on `max_results` accepted from the model.
pub const MAX_RESULTS_LIMIT: usize = 50;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a [`ToolKind`]).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that ran.
    pub tool_name: String,
    /// Result content (JSON string on success, error-marker text on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Builds an error result whose content starts with [`ERROR_MARKER`].
    #[must_use]
    pub fn error(call: &ToolCall, err: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: format!("{ERROR_MARKER} {err}"),
            is_error: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Argument structs
// ---------------------------------------------------------------------------

const fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Arguments for search tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Search query text.
    pub query: String,
    /// Maximum number of results to return.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl SearchArgs {
    /// Returns `max_results` clamped to `1..=MAX_RESULTS_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.max_results.clamp(1, MAX_RESULTS_LIMIT)
    }
}

/// Arguments for `arxiv_direct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArxivIdArgs {
    /// arXiv identifier, e.g. "1706.03762".
    pub arxiv_id: String,
}

/// Arguments for `semantic_scholar_paper_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PaperIdArgs {
    /// Semantic Scholar paper id, or a prefixed external id such as
    /// "DOI:10.18653/v1/N19-1423", "ARXIV:1706.03762" or "CorpusId:13756489".
    pub paper_id: String,
}

/// Arguments for `doi_search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DoiArgs {
    /// DOI, with or without the https://doi.org/ prefix.
    pub doi: String,
}

/// Arguments for `download_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DownloadArgs {
    /// URL of the file to download.
    pub url: String,
    /// Optional file name to save as.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Arguments for `read_webpage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UrlArgs {
    /// Page URL.
    pub url: String,
}

/// Arguments for PDF tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PdfPathArgs {
    /// Local path of a downloaded PDF.
    pub pdf_path: String,
}

/// Arguments for `read_text_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilePathArgs {
    /// Local file path.
    pub filepath: String,
}

/// Arguments for `extract_urls_from_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TextArgs {
    /// Text to scan for URLs.
    pub text: String,
}

/// Arguments for tools that take none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NoArgs {}

// ---------------------------------------------------------------------------
// Tool catalogue
// ---------------------------------------------------------------------------

/// Every tool the model can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// arXiv keyword search.
    ArxivSearch,
    /// arXiv lookup by id.
    ArxivDirect,
    /// DBLP publication search.
    DblpSearch,
    /// DBLP author search.
    DblpSearchAuthors,
    /// DBLP venue search.
    DblpSearchVenues,
    /// Semantic Scholar paper search.
    SemanticScholarSearch,
    /// Semantic Scholar author search.
    SemanticScholarSearchAuthors,
    /// Semantic Scholar paper details.
    SemanticScholarPaperDetails,
    /// Google Custom Search.
    GoogleSearch,
    /// CrossRef DOI lookup.
    DoiSearch,
    /// Download a file.
    DownloadFile,
    /// Fetch a webpage as text.
    ReadWebpage,
    /// Extract PDF text.
    ReadPdfText,
    /// Extract PDF metadata.
    ExtractPdfMetadata,
    /// Extract references from a PDF.
    ExtractReferencesFromPdf,
    /// List downloaded files.
    ListDownloadedFiles,
    /// Read a local text file.
    ReadTextFile,
    /// Extract URLs from text.
    ExtractUrlsFromText,
}

impl ToolKind {
    /// All tools, in the order they are offered to the model.
    pub const ALL: [Self; 18] = [
        Self::DblpSearch,
        Self::SemanticScholarSearch,
        Self::ArxivSearch,
        Self::ArxivDirect,
        Self::DoiSearch,
        Self::GoogleSearch,
        Self::DblpSearchAuthors,
        Self::DblpSearchVenues,
        Self::SemanticScholarSearchAuthors,
        Self::SemanticScholarPaperDetails,
        Self::DownloadFile,
        Self::ReadPdfText,
        Self::ExtractPdfMetadata,
        Self::ExtractReferencesFromPdf,
        Self::ReadWebpage,
        Self::ListDownloadedFiles,
        Self::ReadTextFile,
        Self::ExtractUrlsFromText,
    ];

    /// Returns the wire name of the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArxivSearch => "arxiv_search",
            Self::ArxivDirect => "arxiv_direct",
            Self::DblpSearch => "dblp_search",
            Self::DblpSearchAuthors => "dblp_search_authors",
            Self::DblpSearchVenues => "dblp_search_venues",
            Self::SemanticScholarSearch => "semantic_scholar_search",
            Self::SemanticScholarSearchAuthors => "semantic_scholar_search_authors",
            Self::SemanticScholarPaperDetails => "semantic_scholar_paper_details",
            Self::GoogleSearch => "google_search",
            Self::DoiSearch => "doi_search",
            Self::DownloadFile => "download_file",
            Self::ReadWebpage => "read_webpage",
            Self::ReadPdfText => "read_pdf_text",
            Self::ExtractPdfMetadata => "extract_pdf_metadata",
            Self::ExtractReferencesFromPdf => "extract_references_from_pdf",
            Self::ListDownloadedFiles => "list_downloaded_files",
            Self::ReadTextFile => "read_text_file",
            Self::ExtractUrlsFromText => "extract_urls_from_text",
        }
    }

    /// Looks up a tool by wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Returns the description shown to the model.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ArxivSearch => {
                "Search arXiv preprints. Use sparingly; prefer formal venues first."
            }
            Self::ArxivDirect => "Fetch a single arXiv paper by its identifier.",
            Self::DblpSearch => {
                "Search DBLP for computer science conference and journal papers (highest quality)."
            }
            Self::DblpSearchAuthors => "Search DBLP for authors.",
            Self::DblpSearchVenues => "Search DBLP for venues and conferences.",
            Self::SemanticScholarSearch => {
                "Search Semantic Scholar (all domains, rich metadata). Rate limited: use sparingly."
            }
            Self::SemanticScholarSearchAuthors => {
                "Search Semantic Scholar authors with citation metrics. Rate limited."
            }
            Self::SemanticScholarPaperDetails => {
                "Get detailed Semantic Scholar metadata for one paper id. Rate limited."
            }
            Self::GoogleSearch => {
                "General web search. Use when scholarly sources return nothing relevant."
            }
            Self::DoiSearch => "Resolve a DOI to bibliographic metadata via CrossRef.",
            Self::DownloadFile => {
                "Download a file (usually a PDF) and return its local path. Required before PDF tools."
            }
            Self::ReadWebpage => "Fetch a webpage and return its title and text content.",
            Self::ReadPdfText => "Extract text from a downloaded PDF.",
            Self::ExtractPdfMetadata => "Extract metadata (title, author, dates) from a downloaded PDF.",
            Self::ExtractReferencesFromPdf => {
                "Extract DOIs, arXiv ids and URLs from the references section of a downloaded PDF."
            }
            Self::ListDownloadedFiles => "List files in the download directory.",
            Self::ReadTextFile => "Read a local text file.",
            Self::ExtractUrlsFromText => "Extract unique URLs from a block of text.",
        }
    }

    /// Returns `true` for tools whose successful result is a JSON array of
    /// normalized candidates.
    #[must_use]
    pub const fn yields_candidates(self) -> bool {
        matches!(
            self,
            Self::ArxivSearch
                | Self::ArxivDirect
                | Self::DblpSearch
                | Self::SemanticScholarSearch
                | Self::SemanticScholarPaperDetails
                | Self::GoogleSearch
                | Self::DoiSearch
        )
    }

    /// Returns the JSON schema of this tool's arguments.
    #[must_use]
    pub fn parameters(self) -> serde_json::Value {
        let schema = match self {
            Self::ArxivSearch
            | Self::DblpSearch
            | Self::DblpSearchAuthors
            | Self::DblpSearchVenues
            | Self::SemanticScholarSearch
            | Self::SemanticScholarSearchAuthors
            | Self::GoogleSearch => schema_for!(SearchArgs),
            Self::ArxivDirect => schema_for!(ArxivIdArgs),
            Self::SemanticScholarPaperDetails => schema_for!(PaperIdArgs),
            Self::DoiSearch => schema_for!(DoiArgs),
            Self::DownloadFile => schema_for!(DownloadArgs),
            Self::ReadWebpage => schema_for!(UrlArgs),
            Self::ReadPdfText | Self::ExtractPdfMetadata | Self::ExtractReferencesFromPdf => {
                schema_for!(PdfPathArgs)
            }
            Self::ListDownloadedFiles => schema_for!(NoArgs),
            Self::ReadTextFile => schema_for!(FilePathArgs),
            Self::ExtractUrlsFromText => schema_for!(TextArgs),
        };
        let mut value =
            serde_json::to_value(&schema).unwrap_or_else(|_| json!({"type": "object"}));
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
            obj.entry("properties").or_insert_with(|| json!({}));
        }
        value
    }

    /// Returns the definition sent to the model.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded, tool-specific arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgs {
    /// `arxiv_search`.
    ArxivSearch(SearchArgs),
    /// `arxiv_direct`.
    ArxivDirect(ArxivIdArgs),
    /// `dblp_search`.
    DblpSearch(SearchArgs),
    /// `dblp_search_authors`.
    DblpSearchAuthors(SearchArgs),
    /// `dblp_search_venues`.
    DblpSearchVenues(SearchArgs),
    /// `semantic_scholar_search`.
    SemanticScholarSearch(SearchArgs),
    /// `semantic_scholar_search_authors`.
    SemanticScholarSearchAuthors(SearchArgs),
    /// `semantic_scholar_paper_details`.
    SemanticScholarPaperDetails(PaperIdArgs),
    /// `google_search`.
    GoogleSearch(SearchArgs),
    /// `doi_search`.
    DoiSearch(DoiArgs),
    /// `download_file`.
    DownloadFile(DownloadArgs),
    /// `read_webpage`.
    ReadWebpage(UrlArgs),
    /// `read_pdf_text`.
    ReadPdfText(PdfPathArgs),
    /// `extract_pdf_metadata`.
    ExtractPdfMetadata(PdfPathArgs),
    /// `extract_references_from_pdf`.
    ExtractReferencesFromPdf(PdfPathArgs),
    /// `list_downloaded_files`.
    ListDownloadedFiles(NoArgs),
    /// `read_text_file`.
    ReadTextFile(FilePathArgs),
    /// `extract_urls_from_text`.
    ExtractUrlsFromText(TextArgs),
}

impl ToolArgs {
    /// Decodes the JSON arguments of a call to the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for names outside the catalogue and
    /// [`ToolError::InvalidArguments`] when the arguments do not match the
    /// tool's schema.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        let kind = ToolKind::parse(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        // Models sometimes send an empty string for no-argument tools.
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let args = match kind {
            ToolKind::ArxivSearch => Self::ArxivSearch(decode(kind, arguments)?),
            ToolKind::ArxivDirect => Self::ArxivDirect(decode(kind, arguments)?),
            ToolKind::DblpSearch => Self::DblpSearch(decode(kind, arguments)?),
            ToolKind::DblpSearchAuthors => Self::DblpSearchAuthors(decode(kind, arguments)?),
            ToolKind::DblpSearchVenues => Self::DblpSearchVenues(decode(kind, arguments)?),
            ToolKind::SemanticScholarSearch => {
                Self::SemanticScholarSearch(decode(kind, arguments)?)
            }
            ToolKind::SemanticScholarSearchAuthors => {
                Self::SemanticScholarSearchAuthors(decode(kind, arguments)?)
            }
            ToolKind::SemanticScholarPaperDetails => {
                Self::SemanticScholarPaperDetails(decode(kind, arguments)?)
            }
            ToolKind::GoogleSearch => Self::GoogleSearch(decode(kind, arguments)?),
            ToolKind::DoiSearch => Self::DoiSearch(decode(kind, arguments)?),
            ToolKind::DownloadFile => Self::DownloadFile(decode(kind, arguments)?),
            ToolKind::ReadWebpage => Self::ReadWebpage(decode(kind, arguments)?),
            ToolKind::ReadPdfText => Self::ReadPdfText(decode(kind, arguments)?),
            ToolKind::ExtractPdfMetadata => Self::ExtractPdfMetadata(decode(kind, arguments)?),
            ToolKind::ExtractReferencesFromPdf => {
                Self::ExtractReferencesFromPdf(decode(kind, arguments)?)
            }
            ToolKind::ListDownloadedFiles => Self::ListDownloadedFiles(decode(kind, arguments)?),
            ToolKind::ReadTextFile => Self::ReadTextFile(decode(kind, arguments)?),
            ToolKind::ExtractUrlsFromText => Self::ExtractUrlsFromText(decode(kind, arguments)?),
        };
        Ok(args)
    }

    /// Returns the tool these arguments belong to.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        match self {
            Self::ArxivSearch(_) => ToolKind::ArxivSearch,
            Self::ArxivDirect(_) => ToolKind::ArxivDirect,
            Self::DblpSearch(_) => ToolKind::DblpSearch,
            Self::DblpSearchAuthors(_) => ToolKind::DblpSearchAuthors,
            Self::DblpSearchVenues(_) => ToolKind::DblpSearchVenues,
            Self::SemanticScholarSearch(_) => ToolKind::SemanticScholarSearch,
            Self::SemanticScholarSearchAuthors(_) => ToolKind::SemanticScholarSearchAuthors,
            Self::SemanticScholarPaperDetails(_) => ToolKind::SemanticScholarPaperDetails,
            Self::GoogleSearch(_) => ToolKind::GoogleSearch,
            Self::DoiSearch(_) => ToolKind::DoiSearch,
            Self::DownloadFile(_) => ToolKind::DownloadFile,
            Self::ReadWebpage(_) => ToolKind::ReadWebpage,
            Self::ReadPdfText(_) => ToolKind::ReadPdfText,
            Self::ExtractPdfMetadata(_) => ToolKind::ExtractPdfMetadata,
            Self::ExtractReferencesFromPdf(_) => ToolKind::ExtractReferencesFromPdf,
            Self::ListDownloadedFiles(_) => ToolKind::ListDownloadedFiles,
            Self::ReadTextFile(_) => ToolKind::ReadTextFile,
            Self::ExtractUrlsFromText(_) => ToolKind::ExtractUrlsFromText,
        }
    }

    /// One-line, human-readable description of the call, used for the
    /// "tools used so far" ledger and progress logging.
    #[must_use]
    pub fn summary(&self) -> String {
        let name = self.kind().as_str();
        match self {
            Self::ArxivSearch(a)
            | Self::DblpSearch(a)
            | Self::DblpSearchAuthors(a)
            | Self::DblpSearchVenues(a)
            | Self::SemanticScholarSearch(a)
            | Self::SemanticScholarSearchAuthors(a)
            | Self::GoogleSearch(a) => format!("{name}(query='{}')", a.query),
            Self::ArxivDirect(a) => format!("{name}(arxiv_id='{}')", a.arxiv_id),
            Self::SemanticScholarPaperDetails(a) => format!("{name}(paper_id='{}')", a.paper_id),
            Self::DoiSearch(a) => format!("{name}(doi='{}')", a.doi),
            Self::DownloadFile(a) => format!("{name}(url='{}')", a.url),
            Self::ReadWebpage(a) => format!("{name}(url='{}')", a.url),
            Self::ReadPdfText(a)
            | Self::ExtractPdfMetadata(a)
            | Self::ExtractReferencesFromPdf(a) => {
                format!("{name}(pdf_path='{}')", a.pdf_path)
            }
            Self::ListDownloadedFiles(_) => format!("{name}()"),
            Self::ReadTextFile(a) => format!("{name}(filepath='{}')", a.filepath),
            Self::ExtractUrlsFromText(a) => {
                format!("{name}(text={} chars)", a.text.chars().count())
            }
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ToolKind, arguments: &str) -> Result<T, ToolError> {
    serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
        name: kind.as_str().to_string(),
        message: e.to_string(),
    })
}

/// The set of tool definitions offered to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Every paper-finding tool.
    #[must_use]
    pub fn paper_tools() -> Self {
        Self::from_kinds(&ToolKind::ALL)
    }

    /// A set restricted to the given tools.
    #[must_use]
    pub fn from_kinds(kinds: &[ToolKind]) -> Self {
        Self {
            definitions: kinds.iter().map(|k| k.definition()).collect(),
        }
    }
}
