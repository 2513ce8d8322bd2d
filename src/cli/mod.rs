//! CLI layer for `PaperFinder`.
//!
//! Provides the command-line interface using clap, with commands for
//! one-shot searches, interactive sessions, the tool listing and prompt
//! template setup.

pub mod commands;
pub mod output;
pub mod parser;
pub mod repl;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, EngineArgs};
