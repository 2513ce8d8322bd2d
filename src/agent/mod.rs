//! Paper-finding agent.
//!
//! An LLM-driven tool loop over scholarly search APIs. Uses a pluggable
//! provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! User query → Engine
//!   ├── LlmProvider (decides the next step)
//!   ├── ToolExecutor → ToolRegistry (concurrent, fault-contained)
//!   ├── Aggregator (dedup, rank, cap, render)
//!   ├── RefinementController (document verification or review)
//!   └── SessionLog (per-query context, best effort)
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod executor;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod refine;
pub mod registry;
pub mod session;
pub mod tool;

// Re-export key types
pub use aggregator::{Aggregation, Aggregator, NO_PAPERS_FOUND, ShortList};
pub use config::AgentConfig;
pub use conversation::{Conversation, Turn};
pub use engine::{Engine, QueryOutcome, Termination};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use refine::{Decision, RefinementController, RefinementKind};
pub use registry::{Tool, ToolRegistry};
pub use session::{FileSessionLog, MemorySessionLog, NullSessionLog, QueryContext, SessionLog};
pub use tool::{ToolArgs, ToolCall, ToolDefinition, ToolKind, ToolResult, ToolSet};
