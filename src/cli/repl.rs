//! Interactive session loop.
//!
//! Reads research questions line by line. After each answer, follow-up
//! questions are sent together with the previous answer until the user
//! types `done`, `new` or an empty line.

use std::io::{BufRead, Write};

use tokio::runtime::Runtime;
use tracing::debug;

use crate::agent::Engine;
use crate::agent::prompt::build_follow_up;
use crate::agent::session::SessionLog;
use crate::cli::output::{OutputFormat, format_outcome};
use crate::error::{CommandError, Result};

const BANNER: &str = "PaperFinder interactive session. Type 'quit' to leave.";
const QUESTION_PROMPT: &str = "\nResearch question: ";
const FOLLOW_UP_PROMPT: &str = "\nFollow-up (empty, 'done' or 'new' for a new question): ";

/// Words that end the session.
fn is_exit(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "quit" | "exit" | "q")
}

/// Words that end the follow-up loop.
fn ends_follow_up(input: &str) -> bool {
    input.is_empty() || matches!(input.to_ascii_lowercase().as_str(), "done" | "new")
}

/// Runs the interactive loop until exit or end of input.
///
/// Returns the number of queries answered, follow-ups included.
///
/// # Errors
///
/// Returns [`CommandError::Io`] if reading input or writing output fails.
pub fn run_session<R: BufRead, W: Write>(
    rt: &Runtime,
    engine: &Engine,
    log: &dyn SessionLog,
    format: OutputFormat,
    mut input: R,
    mut output: W,
) -> Result<usize> {
    let mut answered = 0;
    writeln!(output, "{BANNER}").map_err(CommandError::from)?;

    'session: loop {
        let Some(question) = prompt(&mut input, &mut output, QUESTION_PROMPT)? else {
            break;
        };
        if is_exit(&question) {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let outcome = rt.block_on(engine.run(&question, log));
        answered += 1;
        writeln!(output, "\n{}", format_outcome(&outcome, format)?)
            .map_err(CommandError::from)?;
        let mut previous = outcome.answer;

        loop {
            let Some(follow_up) = prompt(&mut input, &mut output, FOLLOW_UP_PROMPT)? else {
                break 'session;
            };
            if is_exit(&follow_up) {
                break 'session;
            }
            if ends_follow_up(&follow_up) {
                break;
            }
            debug!(chars = follow_up.len(), "follow-up question");
            let outcome = rt.block_on(engine.run(&build_follow_up(&previous, &follow_up), log));
            answered += 1;
            writeln!(output, "\n{}", format_outcome(&outcome, format)?)
                .map_err(CommandError::from)?;
            previous = outcome.answer;
        }
    }

    Ok(answered)
}

/// Writes `text` and reads one trimmed line. `None` at end of input.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    text: &str,
) -> Result<Option<String>> {
    write!(output, "{text}").map_err(CommandError::from)?;
    output.flush().map_err(CommandError::from)?;

    let mut line = String::new();
    let read = input.read_line(&mut line).map_err(CommandError::from)?;
    Ok((read > 0).then(|| line.trim().to_string()))
}
