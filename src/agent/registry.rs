//! Tool registry: maps tool names to async implementations.
//!
//! [`ToolRegistry::dispatch`] is the fault boundary of the engine. Argument
//! errors, tool errors, timeouts and panics all come back as a
//! [`ToolResult`] whose content starts with [`ERROR_MARKER`], so a failing
//! tool never interrupts the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::tool::{ERROR_MARKER, ToolArgs, ToolCall, ToolDefinition, ToolKind, ToolResult};
use crate::error::ToolError;

/// Maximum raw byte length of tool argument JSON from the model.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// An async capability the model can call.
///
/// One implementation may serve several tools (e.g. every DBLP endpoint);
/// [`kinds`](Tool::kinds) lists the ones it handles.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tools served by this implementation.
    fn kinds(&self) -> &'static [ToolKind];

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] on failure; the registry converts it into an
    /// error-marker result.
    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Name-indexed collection of tools with a shared time budget.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    /// Registers `tool` under every kind it serves, replacing earlier
    /// registrations.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        for kind in tool.kinds() {
            self.tools.insert(*kind, Arc::clone(&tool));
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Returns `true` if a tool is registered under `kind`.
    #[must_use]
    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    /// Returns the number of registered tool names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the definitions of the registered tools in catalogue order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.contains(*k))
            .map(ToolKind::definition)
            .collect()
    }

    /// Invokes a tool by name with JSON arguments.
    ///
    /// Never fails: errors are returned as error-marker text.
    pub async fn invoke(&self, name: &str, arguments: &str) -> String {
        let call = ToolCall {
            id: String::new(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        };
        self.dispatch(&call).await.content
    }

    /// Executes one tool call inside the fault boundary.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self.run(call).await {
            Ok(content) => ToolResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content,
                is_error: false,
            },
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                ToolResult::error(call, &e)
            }
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<String, ToolError> {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(ToolError::InvalidArguments {
                name: call.name.clone(),
                message: format!(
                    "arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            });
        }

        let args = ToolArgs::parse(&call.name, &call.arguments)?;
        let kind = args.kind();
        let tool = self
            .tools
            .get(&kind)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
            })?;

        debug!(tool = %kind, call_id = %call.id, "dispatching tool call");

        // Spawned so a panicking tool surfaces as a JoinError instead of
        // unwinding through the engine.
        let mut handle = tokio::spawn(async move { tool.invoke(args).await });
        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ToolError::Panicked {
                name: call.name.clone(),
                message: join.to_string(),
            }),
            Err(_) => {
                handle.abort();
                Err(ToolError::Timeout {
                    name: call.name.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tools.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Returns `true` if a tool result reports a failure.
#[must_use]
pub fn is_error_result(content: &str) -> bool {
    content.trim_start().starts_with(ERROR_MARKER)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn kinds(&self) -> &'static [ToolKind] {
            &[ToolKind::DblpSearch, ToolKind::DblpSearchVenues]
        }

        async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
            Ok(args.summary())
        }
    }

    struct Faulty;

    #[async_trait]
    impl Tool for Faulty {
        fn kinds(&self) -> &'static [ToolKind] {
            &[ToolKind::ArxivSearch]
        }

        async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
            panic!("connector exploded");
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn kinds(&self) -> &'static [ToolKind] {
            &[ToolKind::ReadWebpage]
        }

        async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Duration::from_millis(200))
            .with(Arc::new(Echo))
            .with(Arc::new(Faulty))
            .with(Arc::new(Slow))
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let out = registry().invoke("dblp_search", r#"{"query":"bert"}"#).await;
        assert_eq!(out, "dblp_search(query='bert')");
    }

    #[tokio::test]
    async fn test_unregistered_tool_is_error_text() {
        let out = registry().invoke("doi_search", r#"{"doi":"10.1/x"}"#).await;
        assert!(is_error_result(&out), "{out}");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_text() {
        let out = registry().invoke("no_such_tool", "{}").await;
        assert!(out.starts_with("Error: unknown tool"), "{out}");
    }

    #[tokio::test]
    async fn test_bad_arguments_are_error_text() {
        let out = registry().invoke("dblp_search", r#"{"q":1}"#).await;
        assert!(is_error_result(&out));
        assert!(out.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let call = ToolCall {
            id: "c1".to_string(),
            name: "arxiv_search".to_string(),
            arguments: r#"{"query":"x"}"#.to_string(),
        };
        let result = registry().dispatch(&call).await;
        assert!(result.is_error);
        assert_eq!(result.tool_call_id, "c1");
        assert!(is_error_result(&result.content));
    }

    #[tokio::test]
    async fn test_timeout_is_contained() {
        let out = registry().invoke("read_webpage", r#"{"url":"https://x"}"#).await;
        assert!(out.contains("timed out"), "{out}");
    }

    #[tokio::test]
    async fn test_oversized_arguments_rejected() {
        let huge = format!(r#"{{"query":"{}"}}"#, "a".repeat(MAX_TOOL_ARGS_LEN));
        let out = registry().invoke("dblp_search", &huge).await;
        assert!(out.contains("too large"));
    }

    #[test]
    fn test_definitions_only_registered() {
        let defs = registry().definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["dblp_search", "arxiv_search", "dblp_search_venues", "read_webpage"]
        );
    }
}
