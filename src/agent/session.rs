//! Session logging.
//!
//! A [`SessionLog`] records every model turn, tool call and final answer of
//! a session. Logging is a side channel: every method is infallible from
//! the caller's point of view, and implementations swallow their own I/O
//! failures after reporting them through `tracing`.
//!
//! The engine receives a [`QueryContext`] per query, which pairs the log
//! with the query id so components never touch global state.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::core::text::preview;

/// Maximum characters of a tool result copied into the text log.
const TEXT_LOG_PREVIEW: usize = 300;

/// Identifier of one query within a session (`query_<n>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryId(String);

impl QueryId {
    /// Builds the id of the `n`-th query in a session.
    #[must_use]
    pub fn nth(n: usize) -> Self {
        Self(format!("query_{n}"))
    }

    /// Returns the id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a logged model interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Free-text model output.
    LlmResponse,
    /// Model output that requested tools.
    ToolRequest,
    /// Citation block rendered by the aggregator.
    Aggregation,
    /// Refinement instruction sent to the model.
    Refinement,
}

impl InteractionKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LlmResponse => "llm_response",
            Self::ToolRequest => "tool_request",
            Self::Aggregation => "aggregation",
            Self::Refinement => "refinement",
        }
    }
}

/// Best-effort recorder of a session's interactions.
pub trait SessionLog: Send + Sync {
    /// Registers a new query and returns its id.
    fn start_query(&self, text: &str) -> QueryId;

    /// Records a model turn (or engine-injected turn) for a query.
    fn log_model_turn(&self, id: &QueryId, kind: InteractionKind, content: &str);

    /// Records one tool dispatch and its result.
    fn log_tool_call(&self, id: &QueryId, name: &str, args: &str, result: &str);

    /// Records the final answer of a query.
    fn log_final(&self, id: &QueryId, text: &str);

    /// Closes the session. Later calls are ignored.
    fn close(&self);
}

/// Per-query handle threaded through the engine.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    id: &'a QueryId,
    log: &'a dyn SessionLog,
}

impl<'a> QueryContext<'a> {
    /// Pairs a query id with the session log.
    #[must_use]
    pub fn new(id: &'a QueryId, log: &'a dyn SessionLog) -> Self {
        Self { id, log }
    }

    /// Returns the query id.
    #[must_use]
    pub const fn id(&self) -> &QueryId {
        self.id
    }

    /// Records a model turn.
    pub fn model_turn(&self, kind: InteractionKind, content: &str) {
        self.log.log_model_turn(self.id, kind, content);
    }

    /// Records a tool dispatch.
    pub fn tool_call(&self, name: &str, args: &str, result: &str) {
        self.log.log_tool_call(self.id, name, args, result);
    }

    /// Records the final answer.
    pub fn final_answer(&self, text: &str) {
        self.log.log_final(self.id, text);
    }
}

impl std::fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Session log that discards everything.
#[derive(Debug, Default)]
pub struct NullSessionLog {
    queries: Mutex<usize>,
}

impl SessionLog for NullSessionLog {
    fn start_query(&self, _text: &str) -> QueryId {
        let mut n = lock(&self.queries);
        *n += 1;
        QueryId::nth(*n)
    }

    fn log_model_turn(&self, _id: &QueryId, _kind: InteractionKind, _content: &str) {}

    fn log_tool_call(&self, _id: &QueryId, _name: &str, _args: &str, _result: &str) {}

    fn log_final(&self, _id: &QueryId, _text: &str) {}

    fn close(&self) {}
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A query started.
    StartQuery {
        /// Query id.
        query_id: String,
        /// Query text.
        text: String,
    },
    /// A model turn.
    ModelTurn {
        /// Query id.
        query_id: String,
        /// Interaction kind.
        kind: InteractionKind,
        /// Turn content.
        content: String,
    },
    /// A tool dispatch.
    ToolCall {
        /// Query id.
        query_id: String,
        /// Tool name.
        tool: String,
        /// Raw JSON arguments.
        args: String,
        /// Result text.
        result: String,
    },
    /// A final answer.
    Final {
        /// Query id.
        query_id: String,
        /// Answer text.
        text: String,
    },
    /// The session closed.
    Close,
}

/// Session log that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySessionLog {
    events: Mutex<Vec<SessionEvent>>,
    queries: Mutex<usize>,
}

impl MemorySessionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.events).clone()
    }

    fn push(&self, event: SessionEvent) {
        lock(&self.events).push(event);
    }
}

impl SessionLog for MemorySessionLog {
    fn start_query(&self, text: &str) -> QueryId {
        let id = {
            let mut n = lock(&self.queries);
            *n += 1;
            QueryId::nth(*n)
        };
        self.push(SessionEvent::StartQuery {
            query_id: id.to_string(),
            text: text.to_string(),
        });
        id
    }

    fn log_model_turn(&self, id: &QueryId, kind: InteractionKind, content: &str) {
        self.push(SessionEvent::ModelTurn {
            query_id: id.to_string(),
            kind,
            content: content.to_string(),
        });
    }

    fn log_tool_call(&self, id: &QueryId, name: &str, args: &str, result: &str) {
        self.push(SessionEvent::ToolCall {
            query_id: id.to_string(),
            tool: name.to_string(),
            args: args.to_string(),
            result: result.to_string(),
        });
    }

    fn log_final(&self, id: &QueryId, text: &str) {
        self.push(SessionEvent::Final {
            query_id: id.to_string(),
            text: text.to_string(),
        });
    }

    fn close(&self) {
        self.push(SessionEvent::Close);
    }
}

/// A [`SessionEvent`] stamped for the JSONL file.
#[derive(Serialize)]
struct Record<'a> {
    timestamp: DateTime<Utc>,
    session_id: &'a Uuid,
    #[serde(flatten)]
    event: &'a SessionEvent,
}

struct FileState {
    jsonl: Option<File>,
    text: Option<File>,
    queries: usize,
}

/// Session log backed by a JSONL event file and a human-readable text file.
///
/// Files are named `session_<timestamp>.jsonl` and `session_<timestamp>.txt`
/// inside the log directory.
///
/// Writes are short synchronous appends under a mutex, made from inside the
/// async engine. [`SessionLog`] is a sync trait, so logging never adds an
/// await point to the loop.
pub struct FileSessionLog {
    session_id: Uuid,
    jsonl_path: PathBuf,
    text_path: PathBuf,
    state: Mutex<FileState>,
}

impl FileSessionLog {
    /// Creates the log directory and opens both session files.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or files cannot be created.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let started = Utc::now();
        let stamp = started.format("%Y%m%d_%H%M%S");
        let session_id = Uuid::new_v4();
        let jsonl_path = dir.join(format!("session_{stamp}.jsonl"));
        let text_path = dir.join(format!("session_{stamp}.txt"));

        let open = |path: &Path| OpenOptions::new().create(true).append(true).open(path);
        let jsonl = open(&jsonl_path)?;
        let mut text = open(&text_path)?;
        writeln!(
            text,
            "=== Session {session_id} started {} ===",
            started.to_rfc3339()
        )?;

        Ok(Self {
            session_id,
            jsonl_path,
            text_path,
            state: Mutex::new(FileState {
                jsonl: Some(jsonl),
                text: Some(text),
                queries: 0,
            }),
        })
    }

    /// Returns the JSONL event file path.
    #[must_use]
    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    /// Returns the text log path.
    #[must_use]
    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    fn write(&self, event: &SessionEvent, line: &str) {
        let mut state = lock(&self.state);
        let record = Record {
            timestamp: Utc::now(),
            session_id: &self.session_id,
            event,
        };
        if let Some(file) = state.jsonl.as_mut() {
            let result = serde_json::to_string(&record)
                .map_err(std::io::Error::other)
                .and_then(|json| writeln!(file, "{json}"));
            if let Err(e) = result {
                warn!(path = %self.jsonl_path.display(), error = %e, "session log write failed");
            }
        }
        if let Some(file) = state.text.as_mut()
            && let Err(e) = writeln!(file, "[{}] {line}", record.timestamp.format("%H:%M:%S"))
        {
            warn!(path = %self.text_path.display(), error = %e, "session log write failed");
        }
    }
}

impl std::fmt::Debug for FileSessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSessionLog")
            .field("session_id", &self.session_id)
            .field("jsonl_path", &self.jsonl_path)
            .finish_non_exhaustive()
    }
}

impl SessionLog for FileSessionLog {
    fn start_query(&self, text: &str) -> QueryId {
        let id = {
            let mut state = lock(&self.state);
            state.queries += 1;
            QueryId::nth(state.queries)
        };
        self.write(
            &SessionEvent::StartQuery {
                query_id: id.to_string(),
                text: text.to_string(),
            },
            &format!("{id} QUERY {text}"),
        );
        id
    }

    fn log_model_turn(&self, id: &QueryId, kind: InteractionKind, content: &str) {
        self.write(
            &SessionEvent::ModelTurn {
                query_id: id.to_string(),
                kind,
                content: content.to_string(),
            },
            &format!("{id} {} {content}", kind.as_str().to_uppercase()),
        );
    }

    fn log_tool_call(&self, id: &QueryId, name: &str, args: &str, result: &str) {
        self.write(
            &SessionEvent::ToolCall {
                query_id: id.to_string(),
                tool: name.to_string(),
                args: args.to_string(),
                result: result.to_string(),
            },
            &format!(
                "{id} TOOL {name} {args} -> {}",
                preview(result, TEXT_LOG_PREVIEW, "...")
            ),
        );
    }

    fn log_final(&self, id: &QueryId, text: &str) {
        self.write(
            &SessionEvent::Final {
                query_id: id.to_string(),
                text: text.to_string(),
            },
            &format!("{id} FINAL\n{text}"),
        );
    }

    fn close(&self) {
        let closing = {
            let state = lock(&self.state);
            state.jsonl.is_some() || state.text.is_some()
        };
        if !closing {
            return;
        }
        self.write(&SessionEvent::Close, "=== Session closed ===");
        let mut state = lock(&self.state);
        for file in [state.jsonl.take(), state.text.take()].into_iter().flatten() {
            if let Err(e) = file.sync_all() {
                warn!(error = %e, "session log sync failed");
            }
        }
    }
}

/// Locks a mutex, recovering the data if a writer panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
