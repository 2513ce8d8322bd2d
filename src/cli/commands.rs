//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::prompt::PromptSet;
use crate::agent::session::{FileSessionLog, NullSessionLog, SessionLog};
use crate::agent::{Engine, ToolSet};
use crate::cli::output::{OutputFormat, format_outcome, format_tools};
use crate::cli::parser::{Cli, Commands, EngineArgs};
use crate::cli::repl;
use crate::error::{CommandError, Result};
use crate::tools::standard_registry;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete (for example no API
/// key) or the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Search { query, engine } => cmd_search(cli, query, engine, format),
        Commands::Repl { engine } => cmd_repl(cli, engine, format),
        Commands::Tools => cmd_tools(format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the agent configuration from env + CLI overrides.
fn build_config(cli: &Cli, args: &EngineArgs) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(model) = &args.model {
        builder = builder.model(model);
    }
    if let Some(n) = args.max_iterations {
        builder = builder.max_iterations(n);
    }
    if let Some(n) = args.max_refinements {
        builder = builder.max_refinements(n);
    }
    if let Some(dir) = &args.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(dir) = &cli.log_dir {
        builder = builder.log_dir(dir);
    }

    builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
    })
}

fn build_engine(config: AgentConfig) -> Result<Engine> {
    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let registry = standard_registry(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Tool registry creation failed: {e}"))
    })?;
    Ok(Engine::new(provider, Arc::new(registry), config))
}

/// Opens the session log. Failure to open it never blocks a query.
fn open_session_log(cli: &Cli, config: &AgentConfig) -> Box<dyn SessionLog> {
    if cli.no_log {
        return Box::new(NullSessionLog::default());
    }
    match FileSessionLog::open(&config.log_dir) {
        Ok(log) => Box::new(log),
        Err(e) => {
            warn!(dir = %config.log_dir.display(), error = %e, "session log disabled");
            Box::new(NullSessionLog::default())
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_search(
    cli: &Cli,
    query: &str,
    args: &EngineArgs,
    format: OutputFormat,
) -> Result<String> {
    let config = build_config(cli, args)?;
    let log = open_session_log(cli, &config);
    let engine = build_engine(config)?;

    let rt = runtime()?;
    let outcome = rt.block_on(engine.run(query, log.as_ref()));
    log.close();

    format_outcome(&outcome, format)
}

fn cmd_repl(cli: &Cli, args: &EngineArgs, format: OutputFormat) -> Result<String> {
    let config = build_config(cli, args)?;
    let log = open_session_log(cli, &config);
    let engine = build_engine(config)?;
    let rt = runtime()?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = repl::run_session(
        &rt,
        &engine,
        log.as_ref(),
        format,
        stdin.lock(),
        stdout.lock(),
    );
    log.close();

    let queries = result?;
    let noun = if queries == 1 { "query" } else { "queries" };
    Ok(format!("Session ended after {queries} {noun}."))
}

fn cmd_tools(format: OutputFormat) -> Result<String> {
    format_tools(ToolSet::paper_tools().definitions(), format)
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown"));
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the agent prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>(),
                "count": written.len()
            });
            format.to_json(&json)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::tool::ToolKind;
    use tempfile::TempDir;

    #[test]
    fn test_tools_lists_catalogue_without_config() {
        let text = cmd_tools(OutputFormat::Text).unwrap_or_else(|e| panic!("tools: {e}"));
        assert!(text.starts_with(&format!("Available tools ({}):", ToolKind::ALL.len())));
        for kind in ToolKind::ALL {
            assert!(text.contains(kind.as_str()), "missing {kind}");
        }
    }

    #[test]
    fn test_init_prompts_is_idempotent() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));

        let first = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|e| panic!("init: {e}"));
        assert!(first.starts_with("Wrote 3 prompt template(s)"));
        assert!(first.contains("system.md"));

        let second = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|e| panic!("init: {e}"));
        let value: serde_json::Value =
            serde_json::from_str(&second).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(value["count"], 0);
    }
}
