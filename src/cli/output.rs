//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::{QueryOutcome, ToolDefinition};
use crate::error::{CommandError, Result};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if serialization fails.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> Result<String> {
        serde_json::to_string_pretty(value).map_err(|e| {
            CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into()
        })
    }
}

/// Formats a query outcome.
///
/// Text output is the answer followed by a stats footer.
pub fn format_outcome(outcome: &QueryOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut output = outcome.answer.clone();
            let _ = write!(
                output,
                "\n\n---\nStopped: {} | Iterations: {} | Tool calls: {} | Refinements: {} | Papers: {} | Tokens: {} | Time: {:.1}s",
                outcome.termination,
                outcome.iterations,
                outcome.tool_calls,
                outcome.refinements,
                outcome.shortlist.len(),
                outcome.total_tokens,
                outcome.elapsed.as_secs_f64()
            );
            Ok(output)
        }
        OutputFormat::Json => format.to_json(outcome),
    }
}

/// Formats the tool catalogue.
pub fn format_tools(definitions: &[ToolDefinition], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let width = definitions.iter().map(|d| d.name.len()).max().unwrap_or(0);
            let mut output = format!("Available tools ({}):\n", definitions.len());
            for def in definitions {
                let _ = writeln!(output, "  {:<width$}  {}", def.name, def.description);
            }
            Ok(output)
        }
        OutputFormat::Json => format.to_json(definitions),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::{ShortList, Termination};
    use std::time::Duration;

    fn outcome() -> QueryOutcome {
        QueryOutcome {
            answer: "@misc{paper,\n  title = {X}\n}".to_string(),
            termination: Termination::Marker,
            iterations: 3,
            refinements: 1,
            tool_calls: 4,
            shortlist: ShortList::default(),
            total_tokens: 1200,
            elapsed: Duration::from_millis(2500),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse(" JSON "), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_text_outcome_has_footer() {
        let text = format_outcome(&outcome(), OutputFormat::Text)
            .unwrap_or_else(|e| panic!("format: {e}"));
        assert!(text.starts_with("@misc{paper,"));
        assert!(text.contains("\n\n---\nStopped: marker | Iterations: 3 | Tool calls: 4"));
        assert!(text.ends_with("Time: 2.5s"));
    }

    #[test]
    fn test_json_outcome() {
        let json = format_outcome(&outcome(), OutputFormat::Json)
            .unwrap_or_else(|e| panic!("format: {e}"));
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(value["iterations"], 3);
        assert_eq!(value["elapsed"], 2.5);
    }

    #[test]
    fn test_tools_listing() {
        let defs = vec![ToolDefinition {
            name: "arxiv_search".to_string(),
            description: "Search arXiv".to_string(),
            parameters: serde_json::json!({}),
        }];
        let text = format_tools(&defs, OutputFormat::Text)
            .unwrap_or_else(|e| panic!("format: {e}"));
        assert!(text.contains("arxiv_search  Search arXiv"));
    }
}
