//! End-to-end engine scenarios with a scripted model and mock tools.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use paperfinder::agent::session::SessionEvent;
use paperfinder::agent::{
    AgentConfig, ChatRequest, ChatResponse, Engine, LlmProvider, MemorySessionLog,
    NO_PAPERS_FOUND, PromptSet, Role, Termination, Tool, ToolArgs, ToolCall, ToolKind,
    ToolRegistry,
};
use paperfinder::error::{AgentError, ToolError};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Replays a script of responses, then repeats `fallback` forever.
struct ScriptedModel {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
    fallback: ChatResponse,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(script: Vec<Result<ChatResponse, AgentError>>, fallback: ChatResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    /// Last user-role message of every request, in order.
    fn user_messages(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|reqs| {
                reqs.iter()
                    .filter_map(|r| r.messages.iter().rev().find(|m| m.role == Role::User))
                    .map(|m| m.content.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
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

/// Tool that returns a fixed JSON payload for its kinds.
struct Canned {
    kinds: &'static [ToolKind],
    payload: &'static str,
    calls: AtomicUsize,
}

impl Canned {
    fn new(kinds: &'static [ToolKind], payload: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kinds,
            payload,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for Canned {
    fn kinds(&self) -> &'static [ToolKind] {
        self.kinds
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.to_string())
    }
}

struct Exploding;

#[async_trait]
impl Tool for Exploding {
    fn kinds(&self) -> &'static [ToolKind] {
        &[ToolKind::SemanticScholarSearch]
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        panic!("connector bug");
    }
}

struct Stalled;

#[async_trait]
impl Tool for Stalled {
    fn kinds(&self) -> &'static [ToolKind] {
        &[ToolKind::GoogleSearch]
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("[]".to_string())
    }
}

const NEURIPS: &str = r#"[{"title":"Attention Is All You Need","authors":["Ashish Vaswani","Noam Shazeer"],"year":"2017","venue":"NeurIPS 2017","url":"https://papers.nips.cc/paper/7181"}]"#;
const ARXIV: &str = r#"[{"title":"Attention is all you need.","authors":["Ashish Vaswani"],"year":"2017","venue":"arXiv","arxiv_id":"1706.03762","url":"https://arxiv.org/abs/1706.03762"}]"#;
const JOURNAL_ONLY: &str = r#"[{"title":"A Survey of Neural Retrieval Models","authors":["Jane Doe"],"year":"2021","venue":"Information Retrieval Journal","url":"https://example.org/article/42"}]"#;

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        ..ChatResponse::default()
    }
}

fn calls(specs: &[(&str, &str)]) -> ChatResponse {
    ChatResponse {
        tool_calls: specs
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{i}"),
                name: (*name).to_string(),
                arguments: (*args).to_string(),
            })
            .collect(),
        ..ChatResponse::default()
    }
}

fn config(max_iterations: usize, max_refinements: usize) -> AgentConfig {
    AgentConfig::builder()
        .api_key("test-key")
        .max_iterations(max_iterations)
        .max_refinements(max_refinements)
        .build()
        .unwrap_or_else(|e| panic!("config: {e}"))
}

fn prompts() -> PromptSet {
    PromptSet {
        system: "You find papers.".to_string(),
        document_refinement: "VERIFY DOCUMENTS\n{citations}\n{shortlist}".to_string(),
        review_refinement: "REVIEW\n{citations}\n{shortlist}".to_string(),
    }
}

fn engine(model: Arc<ScriptedModel>, registry: ToolRegistry, config: AgentConfig) -> Engine {
    Engine::new(model, Arc::new(registry), config).with_prompts(prompts())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_iteration_guard_bounds_model_calls() {
    let dblp = Canned::new(&[ToolKind::DblpSearch], NEURIPS);
    let model = ScriptedModel::new(
        Vec::new(),
        calls(&[("dblp_search", r#"{"query":"attention"}"#)]),
    );
    let registry = ToolRegistry::new(Duration::from_secs(5)).with(dblp.clone());
    let engine = engine(model.clone(), registry, config(15, 2));

    let out = engine.run("transformers", &MemorySessionLog::new()).await;

    assert!(model.calls() <= 16, "model called {} times", model.calls());
    assert_eq!(out.termination, Termination::IterationLimit);
    assert_eq!(out.iterations, 16);
    assert_eq!(out.refinements, 0);
    // Pending calls of the guard-tripping turn still run.
    assert_eq!(dblp.calls.load(Ordering::SeqCst), 16);
    assert!(out.answer.starts_with("@inproceedings{Vaswani2017,"));
}

#[tokio::test]
async fn test_panicking_and_stalled_tools_are_contained() {
    let dblp = Canned::new(&[ToolKind::DblpSearch], NEURIPS);
    let registry = ToolRegistry::new(Duration::from_millis(100))
        .with(dblp)
        .with(Arc::new(Exploding))
        .with(Arc::new(Stalled));
    let model = ScriptedModel::new(
        vec![Ok(calls(&[
            ("semantic_scholar_search", r#"{"query":"attention"}"#),
            ("dblp_search", r#"{"query":"attention"}"#),
            ("google_search", r#"{"query":"attention"}"#),
        ]))],
        text("Here is what I found."),
    );
    let engine = engine(model.clone(), registry, config(15, 0));
    let log = MemorySessionLog::new();

    let out = engine.run("transformers", &log).await;

    assert_eq!(out.termination, Termination::Accepted);
    assert_eq!(out.tool_calls, 3);
    assert_eq!(out.shortlist.len(), 1);
    assert!(out.answer.contains("title = {Attention Is All You Need}"));

    let results: Vec<(String, String)> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::ToolCall { tool, result, .. } => Some((tool, result)),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "semantic_scholar_search");
    assert!(results[0].1.starts_with("Error:"));
    assert!(!results[1].1.starts_with("Error:"));
    assert_eq!(results[2].0, "google_search");
    assert!(results[2].1.starts_with("Error:"));
}

#[tokio::test]
async fn test_no_candidates_yields_fallback() {
    let empty = Canned::new(&[ToolKind::ArxivSearch], "[]");
    let model = ScriptedModel::new(
        vec![Ok(calls(&[("arxiv_search", r#"{"query":"zzzz"}"#)]))],
        text("Nothing relevant."),
    );
    let registry = ToolRegistry::new(Duration::from_secs(5)).with(empty);
    let engine = engine(model.clone(), registry, config(15, 2));

    let out = engine.run("an obscure topic", &MemorySessionLog::new()).await;

    assert_eq!(out.answer, NO_PAPERS_FOUND);
    assert_eq!(out.termination, Termination::NoResults);
    assert!(out.shortlist.is_empty());
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_venue_version_beats_preprint() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::ArxivSearch], ARXIV))
        .with(Canned::new(&[ToolKind::DblpSearch], NEURIPS));
    let model = ScriptedModel::new(
        vec![Ok(calls(&[
            ("arxiv_search", r#"{"query":"attention"}"#),
            ("dblp_search", r#"{"query":"attention"}"#),
        ]))],
        text("Done."),
    );
    let engine = engine(model, registry, config(15, 0));

    let out = engine.run("attention is all you need", &MemorySessionLog::new()).await;

    assert_eq!(out.shortlist.len(), 1);
    let paper = &out.shortlist.as_slice()[0];
    assert_eq!(paper.venue, "NeurIPS 2017");
    assert!(out.answer.starts_with("@inproceedings{"));
    assert!(out.answer.contains("booktitle = {NeurIPS 2017}"));
}

#[tokio::test]
async fn test_refinement_prefers_document_verification() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::ArxivSearch], ARXIV));
    let model = ScriptedModel::new(
        vec![Ok(calls(&[("arxiv_search", r#"{"query":"attention"}"#)]))],
        text("Checked."),
    );
    let engine = engine(model.clone(), registry, config(15, 1));

    let out = engine.run("attention", &MemorySessionLog::new()).await;

    assert_eq!(out.refinements, 1);
    assert_eq!(out.termination, Termination::Accepted);
    let users = model.user_messages();
    let last = users.last().map_or("", String::as_str);
    assert!(last.starts_with("VERIFY DOCUMENTS\n@misc{Vaswani2017,"));
    assert!(last.contains("https://arxiv.org/pdf/1706.03762"));
    // Accepted on a fresh aggregation, which was never enriched.
    assert_eq!(out.shortlist.len(), 1);
    assert!(out.shortlist.as_slice()[0].pdf_url.is_none());
}

#[tokio::test]
async fn test_marker_after_refinement_keeps_enriched_shortlist() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::ArxivSearch], ARXIV));
    let block = "```bibtex\n@misc{Vaswani2017,\n  title = {Attention Is All You Need}\n}\n```";
    let model = ScriptedModel::new(
        vec![
            Ok(calls(&[("arxiv_search", r#"{"query":"attention"}"#)])),
            Ok(text("Looks right.")),
        ],
        text(&format!("Verified:\n{block}")),
    );
    let engine = engine(model, registry, config(15, 1));

    let out = engine.run("attention", &MemorySessionLog::new()).await;

    assert_eq!(out.termination, Termination::Marker);
    assert_eq!(out.refinements, 1);
    assert_eq!(out.shortlist.len(), 1);
    assert_eq!(
        out.shortlist.as_slice()[0].pdf_url.as_deref(),
        Some("https://arxiv.org/pdf/1706.03762")
    );
}

#[tokio::test]
async fn test_refinement_without_documents_asks_for_review() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::DblpSearch], JOURNAL_ONLY));
    let model = ScriptedModel::new(
        vec![Ok(calls(&[("dblp_search", r#"{"query":"neural retrieval"}"#)]))],
        text("Reviewed."),
    );
    let engine = engine(model.clone(), registry, config(15, 1));

    let out = engine.run("neural retrieval survey", &MemorySessionLog::new()).await;

    assert_eq!(out.refinements, 1);
    let users = model.user_messages();
    assert!(users.last().is_some_and(|m| m.starts_with("REVIEW\n@article{Doe2021,")));
}

#[tokio::test]
async fn test_refinement_rounds_are_capped() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::DblpSearch], NEURIPS));
    let model = ScriptedModel::new(
        vec![Ok(calls(&[("dblp_search", r#"{"query":"attention"}"#)]))],
        text("Still looks right."),
    );
    let engine = engine(model.clone(), registry, config(15, 2));

    let out = engine.run("attention", &MemorySessionLog::new()).await;

    assert_eq!(out.refinements, 2);
    assert_eq!(out.termination, Termination::Accepted);
    // Tool turn, then one model turn per refinement round plus the first
    // aggregation pass.
    assert_eq!(model.calls(), 4);
}

#[tokio::test]
async fn test_marker_answer_short_circuits() {
    let block = "```bibtex\n@article{smith2020,\n  title = {Known Paper}\n}\n```";
    let model = ScriptedModel::new(Vec::new(), text(&format!("Final answer:\n{block}")));
    let engine = engine(
        model.clone(),
        ToolRegistry::new(Duration::from_secs(5)),
        config(15, 2),
    );

    let out = engine.run("known paper", &MemorySessionLog::new()).await;

    assert_eq!(out.termination, Termination::Marker);
    assert_eq!(out.answer, "@article{smith2020,\n  title = {Known Paper}\n}");
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_model_failure_finalizes_with_collected_results() {
    let registry = ToolRegistry::new(Duration::from_secs(5))
        .with(Canned::new(&[ToolKind::DblpSearch], NEURIPS));
    let model = ScriptedModel::new(
        vec![
            Ok(calls(&[("dblp_search", r#"{"query":"attention"}"#)])),
            Err(AgentError::ApiRequest {
                message: "upstream unavailable".to_string(),
                status: Some(503),
            }),
        ],
        text("unreachable"),
    );
    let engine = engine(model.clone(), registry, config(15, 2));

    let out = engine.run("attention", &MemorySessionLog::new()).await;

    assert_eq!(out.termination, Termination::ModelFailure);
    assert_eq!(out.refinements, 0);
    assert!(out.answer.contains("Attention Is All You Need"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_unknown_tool_becomes_error_result() {
    let model = ScriptedModel::new(
        vec![Ok(calls(&[("google_scholar", r#"{"query":"x"}"#)]))],
        text("No luck."),
    );
    let engine = engine(
        model.clone(),
        ToolRegistry::new(Duration::from_secs(5)),
        config(15, 2),
    );
    let log = MemorySessionLog::new();

    let out = engine.run("x", &log).await;

    assert_eq!(out.answer, NO_PAPERS_FOUND);
    let tool_results: Vec<String> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::ToolCall { result, .. } => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert!(tool_results[0].starts_with("Error:"));
}
