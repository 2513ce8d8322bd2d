//! Append-only conversation log for one query.
//!
//! The engine never edits a [`Conversation`] in place: each step produces a
//! new value through [`Conversation::apply`]. Turns carry their origin so
//! the aggregator can tell model output apart from text the engine itself
//! injected (aggregated citation blocks, refinement instructions).

use serde::Serialize;

use crate::agent::message::{ChatMessage, Role};
use crate::agent::tool::ToolCall;

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// System instruction. Always the first turn.
    System {
        /// Instruction text.
        content: String,
    },
    /// User query (or follow-up question).
    User {
        /// Query text.
        content: String,
    },
    /// Reasoning-model output.
    Assistant {
        /// Free text emitted by the model.
        content: String,
        /// Tool calls requested in this turn.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of one tool call.
    ToolResult {
        /// Identifier of the call this answers.
        call_id: String,
        /// Tool that produced the result.
        tool: String,
        /// Result text (JSON on success, error-marker text on failure).
        content: String,
    },
    /// Citation block rendered by the aggregator.
    Aggregated {
        /// Rendered citation block.
        block: String,
    },
    /// Instruction emitted by the refinement controller.
    Refinement {
        /// Instruction text.
        instruction: String,
    },
}

impl Turn {
    /// Returns the chat role this turn is sent to the model as.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } | Self::Refinement { .. } => Role::User,
            Self::Assistant { .. } | Self::Aggregated { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    /// Returns the text carried by this turn.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. } => content,
            Self::Aggregated { block } => block,
            Self::Refinement { instruction } => instruction,
        }
    }

    /// Converts this turn into a provider-agnostic chat message.
    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role(),
            content: self.content().to_string(),
            tool_calls: match self {
                Self::Assistant { tool_calls, .. } => tool_calls.clone(),
                _ => Vec::new(),
            },
            tool_call_id: match self {
                Self::ToolResult { call_id, .. } => Some(call_id.clone()),
                _ => None,
            },
        }
    }
}

/// Ordered, append-only sequence of turns.
///
/// Constructed with the system instruction and the user query, so the
/// first turn is always [`Turn::System`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Starts a conversation from a system instruction and a user query.
    #[must_use]
    pub fn new(system: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            turns: vec![
                Turn::System {
                    content: system.into(),
                },
                Turn::User {
                    content: query.into(),
                },
            ],
        }
    }

    /// Returns a new conversation extended by `turn`.
    ///
    /// A second system turn is demoted to a user turn so the first-turn
    /// invariant holds.
    #[must_use]
    pub fn apply(mut self, turn: Turn) -> Self {
        let turn = match turn {
            Turn::System { content } => Turn::User { content },
            other => other,
        };
        self.turns.push(turn);
        self
    }

    /// Returns a new conversation extended by every turn in `turns`.
    #[must_use]
    pub fn apply_all(self, turns: impl IntoIterator<Item = Turn>) -> Self {
        turns.into_iter().fold(self, Self::apply)
    }

    /// Returns all turns in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always `false`: a conversation holds at least its system turn.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the system instruction.
    #[must_use]
    pub fn system(&self) -> &str {
        self.turns.first().map_or("", Turn::content)
    }

    /// Returns the most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Converts the conversation into chat messages, replacing the system
    /// instruction with `system_override` when given.
    #[must_use]
    pub fn to_messages(&self, system_override: Option<&str>) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .enumerate()
            .map(|(i, turn)| match (i, system_override) {
                (0, Some(system)) => ChatMessage {
                    role: Role::System,
                    content: system.to_string(),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                },
                _ => turn.to_message(),
            })
            .collect()
    }
}
