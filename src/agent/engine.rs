//! The paper-finding engine.
//!
//! A ReAct-style state machine: ask the model for the next step, run the
//! tools it requests, and once it stops requesting tools aggregate what
//! was found and either accept the citations or send a refinement
//! instruction back.
//!
//! ```text
//! AwaitDecision ──tools──> ExecuteTools ──> AwaitDecision
//!      │ citation block                         ▲
//!      ├──────────────> Terminal                │ refinement
//!      │ free text                              │
//!      └──────────────> Aggregate ──> RefineOrDone ──> Terminal
//! ```
//!
//! The iteration guard and model-call failures both skip refinement and
//! finalize from the current conversation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregator::{Aggregation, Aggregator, NO_PAPERS_FOUND, ShortList};
use super::config::AgentConfig;
use super::conversation::{Conversation, Turn};
use super::executor::ToolExecutor;
use super::message::{ChatRequest, TokenUsage};
use super::prompt::{PromptSet, build_system_with_ledger};
use super::provider::LlmProvider;
use super::refine::{Decision, RefinementController, extract_citation_block};
use super::registry::ToolRegistry;
use super::session::{InteractionKind, QueryContext, SessionLog};
use super::tool::ToolCall;
use crate::citation::{BibtexFormatter, CitationFormatter};

/// Why a query stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model emitted a finished citation block.
    Marker,
    /// The rendered shortlist was accepted.
    Accepted,
    /// Nothing survived aggregation.
    NoResults,
    /// The iteration guard fired.
    IterationLimit,
    /// A model call failed.
    ModelFailure,
}

impl Termination {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::Accepted => "accepted",
            Self::NoResults => "no_results",
            Self::IterationLimit => "iteration_limit",
            Self::ModelFailure => "model_failure",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Final citation block, or [`NO_PAPERS_FOUND`].
    pub answer: String,
    /// Why the query stopped.
    pub termination: Termination,
    /// Model calls made.
    pub iterations: usize,
    /// Refinement rounds requested.
    pub refinements: usize,
    /// Tool calls dispatched.
    pub tool_calls: usize,
    /// Last shortlist produced by aggregation.
    pub shortlist: ShortList,
    /// Total tokens consumed.
    pub total_tokens: u32,
    /// Total elapsed time.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// Engine states.
#[derive(Debug)]
enum State {
    AwaitDecision,
    ExecuteTools { calls: Vec<ToolCall>, guard: bool },
    Aggregate { finalize: Option<Termination> },
    RefineOrDone(Aggregation),
    Terminal { answer: String, reason: Termination },
}

/// Mutable bookkeeping for one query run.
#[derive(Debug, Default)]
struct RunStats {
    iterations: usize,
    refinements: usize,
    tool_calls: usize,
    usage: TokenUsage,
    ledger: Vec<String>,
    shortlist: ShortList,
}

/// Drives queries through the reasoning model and the tool registry.
pub struct Engine {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    formatter: Arc<dyn CitationFormatter>,
    config: AgentConfig,
    prompts: PromptSet,
}

impl Engine {
    /// Creates an engine with BibTeX output.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            registry,
            formatter: Arc::new(BibtexFormatter),
            config,
            prompts,
        }
    }

    /// Replaces the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the citation formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn CitationFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs one query to completion.
    ///
    /// Never fails: every path ends in a citation block or
    /// [`NO_PAPERS_FOUND`]. Interactions are reported to `log` under a
    /// fresh query id.
    pub async fn run(&self, query: &str, log: &dyn SessionLog) -> QueryOutcome {
        let start = Instant::now();
        let id = log.start_query(query);
        let ctx = QueryContext::new(&id, log);
        info!(query = %id, model = %self.config.model, "starting query");

        let mut stats = RunStats::default();
        let (answer, termination) = if query.trim().is_empty() {
            (NO_PAPERS_FOUND.to_string(), Termination::NoResults)
        } else {
            self.drive(query, ctx, &mut stats).await
        };

        ctx.final_answer(&answer);
        info!(
            query = %id,
            termination = %termination,
            iterations = stats.iterations,
            refinements = stats.refinements,
            tool_calls = stats.tool_calls,
            "query finished"
        );

        QueryOutcome {
            answer,
            termination,
            iterations: stats.iterations,
            refinements: stats.refinements,
            tool_calls: stats.tool_calls,
            shortlist: stats.shortlist,
            total_tokens: stats.usage.total_tokens,
            elapsed: start.elapsed(),
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn drive(
        &self,
        query: &str,
        ctx: QueryContext<'_>,
        stats: &mut RunStats,
    ) -> (String, Termination) {
        let aggregator = Aggregator::new(self.formatter.as_ref(), self.config.shortlist_size);
        let controller = RefinementController::new(&self.prompts, self.config.max_refinements);
        let executor = ToolExecutor::new(&self.registry);
        let tools = self.registry.definitions();

        let mut conversation = Conversation::new(self.prompts.system.clone(), query);
        let mut state = State::AwaitDecision;

        loop {
            state = match state {
                State::AwaitDecision => {
                    let request = ChatRequest {
                        model: self.config.model.clone(),
                        messages: conversation.to_messages(Some(&build_system_with_ledger(
                            &self.prompts.system,
                            &stats.ledger,
                        ))),
                        temperature: Some(self.config.temperature),
                        max_tokens: Some(self.config.max_tokens),
                        tools: tools.clone(),
                    };

                    match self.provider.chat(&request).await {
                        Ok(response) => {
                            stats.iterations += 1;
                            stats.usage.accumulate(response.usage);
                            let kind = if response.tool_calls.is_empty() {
                                InteractionKind::LlmResponse
                            } else {
                                InteractionKind::ToolRequest
                            };
                            ctx.model_turn(kind, &response.content);
                            debug!(
                                query = %ctx.id(),
                                iteration = stats.iterations,
                                tool_calls = response.tool_calls.len(),
                                "model responded"
                            );

                            let calls = response.tool_calls.clone();
                            let text = response.content.clone();
                            conversation = conversation.apply(Turn::Assistant {
                                content: response.content,
                                tool_calls: response.tool_calls,
                            });

                            if stats.iterations > self.config.max_iterations {
                                warn!(
                                    query = %ctx.id(),
                                    limit = self.config.max_iterations,
                                    "iteration limit reached, finalizing"
                                );
                                if calls.is_empty() {
                                    State::Aggregate {
                                        finalize: Some(Termination::IterationLimit),
                                    }
                                } else {
                                    State::ExecuteTools { calls, guard: true }
                                }
                            } else if !calls.is_empty() {
                                State::ExecuteTools {
                                    calls,
                                    guard: false,
                                }
                            } else if let Some(block) = extract_citation_block(&text) {
                                State::Terminal {
                                    answer: block,
                                    reason: Termination::Marker,
                                }
                            } else {
                                State::Aggregate { finalize: None }
                            }
                        }
                        Err(e) => {
                            warn!(query = %ctx.id(), error = %e, "model call failed, finalizing");
                            State::Aggregate {
                                finalize: Some(Termination::ModelFailure),
                            }
                        }
                    }
                }

                State::ExecuteTools { calls, guard } => {
                    let turn = conversation.len() - 1;
                    let executed = executor.execute_all(&calls, turn, ctx).await;
                    stats.tool_calls += executed.len();
                    for done in executed {
                        stats.ledger.push(done.summary);
                        conversation = conversation.apply(Turn::ToolResult {
                            call_id: done.call.id,
                            tool: done.call.name,
                            content: done.result.content,
                        });
                    }
                    if guard {
                        State::Aggregate {
                            finalize: Some(Termination::IterationLimit),
                        }
                    } else {
                        State::AwaitDecision
                    }
                }

                State::Aggregate { finalize } => {
                    let aggregation = aggregator.aggregate(&conversation);
                    ctx.model_turn(InteractionKind::Aggregation, &aggregation.rendered);
                    debug!(
                        query = %ctx.id(),
                        shortlist = aggregation.shortlist.len(),
                        "aggregated candidates"
                    );
                    stats.shortlist = aggregation.shortlist.clone();
                    conversation = conversation.apply(Turn::Aggregated {
                        block: aggregation.rendered.clone(),
                    });

                    match finalize {
                        _ if aggregation.is_empty() => State::Terminal {
                            answer: aggregation.rendered,
                            reason: finalize.unwrap_or(Termination::NoResults),
                        },
                        Some(reason) => State::Terminal {
                            answer: aggregation.rendered,
                            reason,
                        },
                        None => State::RefineOrDone(aggregation),
                    }
                }

                State::RefineOrDone(aggregation) => {
                    match controller.decide(&aggregation, stats.refinements) {
                        Decision::Complete(answer) => State::Terminal {
                            answer,
                            reason: Termination::Accepted,
                        },
                        Decision::NeedsRefinement {
                            instruction,
                            kind,
                            shortlist,
                        } => {
                            stats.refinements += 1;
                            info!(
                                query = %ctx.id(),
                                round = stats.refinements,
                                kind = kind.as_str(),
                                "requesting refinement"
                            );
                            ctx.model_turn(InteractionKind::Refinement, &instruction);
                            // The enriched list stands until the next aggregation.
                            stats.shortlist = shortlist;
                            conversation = conversation.apply(Turn::Refinement { instruction });
                            State::AwaitDecision
                        }
                    }
                }

                State::Terminal { answer, reason } => return (answer, reason),
            };
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("provider", &self.provider.name())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::message::ChatResponse;
    use crate::agent::registry::Tool;
    use crate::agent::session::{MemorySessionLog, SessionEvent};
    use crate::agent::tool::{ToolArgs, ToolKind};
    use crate::error::{AgentError, ToolError};

    /// Replays a fixed script of responses, then repeats the fallback.
    struct Scripted {
        script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
        fallback: ChatResponse,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<ChatResponse, AgentError>>, fallback: ChatResponse) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().map_or(0, |r| r.len())
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            if let Ok(mut r) = self.requests.lock() {
                r.push(request.clone());
            }
            let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    struct Dblp;

    #[async_trait]
    impl Tool for Dblp {
        fn kinds(&self) -> &'static [ToolKind] {
            &[ToolKind::DblpSearch]
        }

        async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
            Ok(concat!(
                r#"[{"title":"Attention Is All You Need","authors":["Ashish Vaswani"],"#,
                r#""year":"2017","venue":"NeurIPS 2017","url":"https://dblp.org/rec/x"}]"#
            )
            .to_string())
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            ..ChatResponse::default()
        }
    }

    fn tool_call(name: &str, args: &str) -> ChatResponse {
        ChatResponse {
            tool_calls: vec![ToolCall {
                id: "call".to_string(),
                name: name.to_string(),
                arguments: args.to_string(),
            }],
            ..ChatResponse::default()
        }
    }

    fn config(max_refinements: usize) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .max_refinements(max_refinements)
            .build()
            .unwrap_or_else(|e| panic!("config: {e}"))
    }

    fn engine(provider: Arc<Scripted>, max_refinements: usize) -> Engine {
        let registry = ToolRegistry::new(Duration::from_secs(5)).with(Arc::new(Dblp));
        Engine::new(provider, Arc::new(registry), config(max_refinements))
            .with_prompts(PromptSet::defaults())
    }

    #[tokio::test]
    async fn test_marker_terminates() {
        let provider = Arc::new(Scripted::new(
            vec![Ok(text("Done:\n```bibtex\n@misc{a,\n  title = {x}\n}\n```"))],
            text("unused"),
        ));
        let log = MemorySessionLog::new();
        let out = engine(Arc::clone(&provider), 2).run("find x", &log).await;

        assert_eq!(out.termination, Termination::Marker);
        assert_eq!(out.answer, "@misc{a,\n  title = {x}\n}");
        assert_eq!(provider.calls(), 1);
        assert!(log.events().iter().any(|e| matches!(e, SessionEvent::Final { .. })));
    }

    #[tokio::test]
    async fn test_empty_query_skips_model() {
        let provider = Arc::new(Scripted::new(Vec::new(), text("unused")));
        let out = engine(Arc::clone(&provider), 2)
            .run("   ", &MemorySessionLog::new())
            .await;
        assert_eq!(out.answer, NO_PAPERS_FOUND);
        assert_eq!(out.termination, Termination::NoResults);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_ledger_is_appended_to_system_prompt() {
        let provider = Arc::new(Scripted::new(
            vec![
                Ok(tool_call("dblp_search", r#"{"query":"attention"}"#)),
                Ok(text("```bibtex\n@misc{a,}\n```")),
            ],
            text("unused"),
        ));
        let out = engine(Arc::clone(&provider), 2)
            .run("attention", &MemorySessionLog::new())
            .await;
        assert_eq!(out.tool_calls, 1);

        let requests = provider.requests.lock().map(|r| r.clone()).unwrap_or_default();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].messages[0].content.contains("TOOLS USED SO FAR"));
        assert!(
            requests[1].messages[0]
                .content
                .contains("- dblp_search(query='attention')")
        );
        assert_eq!(requests[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_refinement_then_accept() {
        let provider = Arc::new(Scripted::new(
            vec![Ok(tool_call("dblp_search", r#"{"query":"attention"}"#))],
            text("Looks fine."),
        ));
        let out = engine(Arc::clone(&provider), 1)
            .run("attention", &MemorySessionLog::new())
            .await;

        // tool request, first answer, answer after the single refinement round
        assert_eq!(provider.calls(), 3);
        assert_eq!(out.refinements, 1);
        assert_eq!(out.termination, Termination::Accepted);
        assert!(out.answer.starts_with("@inproceedings{Vaswani2017,"));
        assert_eq!(out.shortlist.len(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_finalizes_without_refinement() {
        let provider = Arc::new(Scripted::new(
            vec![
                Ok(tool_call("dblp_search", r#"{"query":"attention"}"#)),
                Err(AgentError::ApiRequest {
                    message: "boom".to_string(),
                    status: Some(500),
                }),
            ],
            text("unused"),
        ));
        let out = engine(Arc::clone(&provider), 2)
            .run("attention", &MemorySessionLog::new())
            .await;
        assert_eq!(out.termination, Termination::ModelFailure);
        assert_eq!(out.refinements, 0);
        assert!(out.answer.contains("Attention Is All You Need"));
    }
}
