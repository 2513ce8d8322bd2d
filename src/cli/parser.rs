//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// `PaperFinder`: an agent that searches scholarly sources and returns
/// BibTeX citations for the papers that best match a question.
#[derive(Parser, Debug)]
#[command(name = "paperfinder")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Disable the session log files.
    #[arg(long, global = true)]
    pub no_log: bool,

    /// Directory for session log files.
    ///
    /// Defaults to `./logs`.
    #[arg(long, global = true, env = "PAPERFINDER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find papers for one query.
    ///
    /// Runs the agent until it produces a citation block, then prints it.
    /// Requires an OpenAI-compatible API key.
    #[command(after_help = r#"Examples:
  paperfinder search "original transformer paper"
  paperfinder search "BERT pre-training" --max-iterations 8
  paperfinder --format json search "diffusion models survey" | jq '.shortlist[].title'
  OPENAI_API_KEY=sk-... paperfinder search "graph attention networks"
"#)]
    Search {
        /// The research question.
        query: String,

        /// Engine options.
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Interactive session with follow-up questions.
    ///
    /// Type `quit`, `exit` or `q` to leave. After each answer, follow-up
    /// questions are answered in the context of the previous results until
    /// `done`, `new` or an empty line.
    Repl {
        /// Engine options.
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// List the available tools.
    Tools,

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are never overwritten.
    #[command(after_help = r#"Examples:
  paperfinder init-prompts
  paperfinder init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory. Defaults to `~/.config/paperfinder/prompts`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Options shared by the commands that run the engine.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Reasoning model name.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum model calls per query.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Maximum refinement rounds per query.
    #[arg(long)]
    pub max_refinements: Option<usize>,

    /// Directory containing prompt template files.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,
}
