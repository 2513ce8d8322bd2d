//! Document tools: downloads, PDF text and metadata, reference extraction
//! and local file reading.
//!
//! PDF handling shells out to poppler's `pdftotext` and `pdfinfo`. When
//! they are not installed the PDF tools report themselves unavailable.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::http::HttpClient;
use super::web::extract_urls;
use super::{misrouted, to_json};
use crate::agent::registry::Tool;
use crate::agent::tool::{ToolArgs, ToolKind};
use crate::core::text::preview;
use crate::error::ToolError;

/// Characters of extracted text returned to the model.
pub const TEXT_PREVIEW_CHARS: usize = 5000;
const PDF_TRUNCATED: &str = "...\n[TEXT TRUNCATED - Full text available in file]";
const FILE_TRUNCATED: &str = "...\n[FILE TRUNCATED]";

static DOI: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b10\.\d{4,9}/[^\s]+").ok());
static ARXIV: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:arxiv\.org/(?:abs/|pdf/)?|arXiv:\s*)(\d{4}\.\d{4,5}(?:v\d+)?)").ok()
});

/// A file saved by `download_file`.
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    /// Where the file was written.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Response content type, if reported.
    pub content_type: Option<String>,
}

/// Extracted text with a bounded preview.
#[derive(Debug, Clone, Serialize)]
pub struct TextExtract {
    /// Source file.
    pub path: String,
    /// Length of the full text in characters.
    pub length: usize,
    /// Text preview.
    pub content: String,
}

/// Identifiers found in a document's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct References {
    /// DOIs, in order of appearance.
    pub dois: Vec<String>,
    /// arXiv identifiers.
    pub arxiv_ids: Vec<String>,
    /// Other URLs.
    pub urls: Vec<String>,
}

/// Tools that work on downloaded documents.
#[derive(Debug, Clone)]
pub struct DocumentTools {
    http: HttpClient,
    download_dir: PathBuf,
}

impl DocumentTools {
    /// Creates the document tools rooted at `download_dir`.
    #[must_use]
    pub const fn new(http: HttpClient, download_dir: PathBuf) -> Self {
        Self { http, download_dir }
    }

    /// Downloads `url` into the download directory.
    pub async fn download(
        &self,
        url: &str,
        filename: Option<&str>,
    ) -> Result<SavedFile, ToolError> {
        let response = self.http.get("download", url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| ToolError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let is_pdf = content_type.as_deref().is_some_and(|t| t.contains("pdf"))
            || bytes.starts_with(b"%PDF");
        let name = file_name(filename.unwrap_or_else(|| url_file_name(url)), is_pdf);

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| io_error(&self.download_dir, e))?;
        let path = self.download_dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| io_error(&path, e))?;

        info!(url, path = %path.display(), bytes = bytes.len(), "downloaded file");
        Ok(SavedFile {
            path: path.display().to_string(),
            size: bytes.len() as u64,
            content_type,
        })
    }

    /// Extracts the text layer of a PDF.
    pub async fn pdf_text(&self, pdf_path: &str) -> Result<TextExtract, ToolError> {
        let path = self.resolve(pdf_path);
        let args = [OsStr::new("-layout"), path.as_os_str(), OsStr::new("-")];
        let text = run_poppler("pdftotext", &args).await?;
        Ok(TextExtract {
            path: path.display().to_string(),
            length: text.chars().count(),
            content: preview(&text, TEXT_PREVIEW_CHARS, PDF_TRUNCATED),
        })
    }

    /// Reads the PDF document information dictionary.
    pub async fn pdf_metadata(
        &self,
        pdf_path: &str,
    ) -> Result<BTreeMap<String, String>, ToolError> {
        let path = self.resolve(pdf_path);
        let output = run_poppler("pdfinfo", &[path.as_os_str()]).await?;
        Ok(parse_pdfinfo(&output))
    }

    /// Collects DOIs, arXiv ids and URLs from a PDF's full text.
    pub async fn pdf_references(&self, pdf_path: &str) -> Result<References, ToolError> {
        let path = self.resolve(pdf_path);
        let text = run_poppler("pdftotext", &[path.as_os_str(), OsStr::new("-")]).await?;
        Ok(find_references(&text))
    }

    /// Lists files in the download directory. A missing directory is empty.
    pub async fn list_downloads(&self) -> Result<Vec<SavedFile>, ToolError> {
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.download_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.download_dir, e))?
        {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_file() {
                files.push(SavedFile {
                    path: entry.path().display().to_string(),
                    size: meta.len(),
                    content_type: None,
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Reads a text file with a bounded preview.
    pub async fn read_text(&self, filepath: &str) -> Result<TextExtract, ToolError> {
        let path = self.resolve(filepath);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(TextExtract {
            path: path.display().to_string(),
            length: text.chars().count(),
            content: preview(&text, TEXT_PREVIEW_CHARS, FILE_TRUNCATED),
        })
    }

    /// Relative paths that do not exist as given are looked up in the
    /// download directory.
    fn resolve(&self, path: &str) -> PathBuf {
        let given = PathBuf::from(path.trim());
        if given.is_absolute() || given.exists() {
            given
        } else {
            self.download_dir.join(given)
        }
    }
}

#[async_trait]
impl Tool for DocumentTools {
    fn kinds(&self) -> &'static [ToolKind] {
        &[
            ToolKind::DownloadFile,
            ToolKind::ReadPdfText,
            ToolKind::ExtractPdfMetadata,
            ToolKind::ExtractReferencesFromPdf,
            ToolKind::ListDownloadedFiles,
            ToolKind::ReadTextFile,
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match &args {
            ToolArgs::DownloadFile(a) => {
                to_json(&self.download(&a.url, a.filename.as_deref()).await?)
            }
            ToolArgs::ReadPdfText(a) => to_json(&self.pdf_text(&a.pdf_path).await?),
            ToolArgs::ExtractPdfMetadata(a) => to_json(&self.pdf_metadata(&a.pdf_path).await?),
            ToolArgs::ExtractReferencesFromPdf(a) => {
                to_json(&self.pdf_references(&a.pdf_path).await?)
            }
            ToolArgs::ListDownloadedFiles(_) => to_json(&self.list_downloads().await?),
            ToolArgs::ReadTextFile(a) => to_json(&self.read_text(&a.filepath).await?),
            _ => Err(misrouted(&args)),
        }
    }
}

/// Runs a poppler utility and returns its stdout.
async fn run_poppler(program: &str, args: &[&OsStr]) -> Result<String, ToolError> {
    debug!(program, "running");
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::Unavailable {
                name: program.to_string(),
                reason: "not installed (install poppler-utils)".to_string(),
            },
            _ => io_error(Path::new(program), e),
        })?;

    if !output.status.success() {
        return Err(ToolError::Decode {
            what: format!("{program} output"),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn io_error(path: &Path, source: std::io::Error) -> ToolError {
    ToolError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Last path segment of a URL, without query or fragment.
fn url_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Sanitizes a file name, appending `.pdf` for PDF payloads.
fn file_name(raw: &str, is_pdf: bool) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    name = name.trim_matches('.').to_string();
    if name.is_empty() {
        name = "download".to_string();
    }
    if is_pdf && !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

fn parse_pdfinfo(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}

/// Finds DOIs, arXiv ids and URLs in extracted text.
#[must_use]
pub fn find_references(text: &str) -> References {
    let trim = |s: &str| s.trim_end_matches(['.', ',', ';', ':', ')', ']']).to_string();

    let mut seen = HashSet::new();
    let dois = DOI
        .as_ref()
        .map(|re| {
            re.find_iter(text)
                .map(|m| trim(m.as_str()))
                .filter(|d| seen.insert(d.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let arxiv_ids = ARXIV
        .as_ref()
        .map(|re| {
            re.captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|id| seen.insert(id.clone()))
                .collect()
        })
        .unwrap_or_default();

    References {
        dois,
        arxiv_ids,
        urls: extract_urls(text),
    }
}
