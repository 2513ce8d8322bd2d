//! Executes the tool calls of one model turn.
//!
//! Calls within a turn are independent, so they are dispatched
//! concurrently; results come back in request order. Each call and its
//! result are reported to the session log.

use futures_util::future::join_all;
use tracing::info;

use super::registry::ToolRegistry;
use super::session::QueryContext;
use super::tool::{ToolArgs, ToolCall, ToolResult};

/// A resolved tool call, ready to be appended to the conversation.
#[derive(Debug, Clone)]
pub struct ExecutedCall {
    /// The call as issued by the model.
    pub call: ToolCall,
    /// Index of the conversation turn that issued the call.
    pub turn: usize,
    /// Human-readable summary for the "tools used" ledger.
    pub summary: String,
    /// Dispatch result.
    pub result: ToolResult,
}

/// Dispatches batches of tool calls through a [`ToolRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> ToolExecutor<'a> {
    /// Creates an executor over `registry`.
    #[must_use]
    pub const fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Executes every call issued by conversation turn `turn`.
    ///
    /// Returns one [`ExecutedCall`] per input call, in the same order.
    pub async fn execute_all(
        &self,
        calls: &[ToolCall],
        turn: usize,
        ctx: QueryContext<'_>,
    ) -> Vec<ExecutedCall> {
        let results = join_all(calls.iter().map(|call| self.registry.dispatch(call))).await;

        calls
            .iter()
            .zip(results)
            .map(|(call, result)| {
                let summary = describe(call);
                info!(
                    query = %ctx.id(),
                    turn,
                    tool = %call.name,
                    is_error = result.is_error,
                    "{summary}"
                );
                ctx.tool_call(&call.name, &call.arguments, &result.content);
                ExecutedCall {
                    call: call.clone(),
                    turn,
                    summary,
                    result,
                }
            })
            .collect()
    }
}

/// Summarizes a call from its typed arguments, falling back to the raw
/// name when the arguments do not decode.
fn describe(call: &ToolCall) -> String {
    ToolArgs::parse(&call.name, &call.arguments)
        .map_or_else(|_| format!("{}(<invalid arguments>)", call.name), |a| a.summary())
}
