//! `paperfinder` binary entry point.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use paperfinder::cli::{Cli, execute};

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, "could not load .env");
    }

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    execute(cli).with_context(|| format!("{} failed", command_name(cli)))
}

const fn command_name(cli: &Cli) -> &'static str {
    use paperfinder::cli::Commands;
    match cli.command {
        Commands::Search { .. } => "search",
        Commands::Repl { .. } => "repl",
        Commands::Tools => "tools",
        Commands::InitPrompts { .. } => "init-prompts",
    }
}

/// Diagnostics go to stderr so stdout carries only answers.
fn init_tracing(verbose: bool) {
    let default = if verbose { "paperfinder=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
