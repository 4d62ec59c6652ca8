//! End-to-end integration tests for the DeepDive research pipeline.
//!
//! These tests run the full director hierarchy offline: a scripted model
//! plays every agent, and a stub search backend stands in for Tavily.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deepdive_agent::research::{
    DIRECTOR_INSTRUCTIONS, FACTS_FINDER_INSTRUCTIONS, REPORT_WRITER_INSTRUCTIONS,
    SOURCE_CHECKER_INSTRUCTIONS,
};
use deepdive_agent::{Runner, RunnerConfig, build_director};
use deepdive_config::AppConfig;
use deepdive_core::agent::ToolChoice;
use deepdive_core::error::{LoopError, ProviderError, SearchError};
use deepdive_core::event::{ProgressLog, ProgressSink};
use deepdive_core::message::{Message, MessageToolCall, Role};
use deepdive_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use deepdive_core::search::{SearchClient, SearchResponse, SearchResult};
use deepdive_core::tool::ToolRef;
use deepdive_tools::WebSearchTool;

// ── Scripted model ───────────────────────────────────────────────────────

type Respond = dyn Fn(&ProviderRequest) -> ProviderResponse + Send + Sync;

/// A model that answers each request from the request itself, so concurrent
/// nested runs get consistent replies whatever order they arrive in.
struct ScriptedModel {
    respond: Box<Respond>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedModel {
    fn new(respond: impl Fn(&ProviderRequest) -> ProviderResponse + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests_for(&self, instructions: &str) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.messages[0].content == instructions)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let response = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools("", tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

fn user_input(request: &ProviderRequest) -> &str {
    &request.messages[1].content
}

fn tool_outputs(request: &ProviderRequest) -> Vec<&str> {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect()
}

/// Plays every agent of a well-behaved research run.
fn research_script(request: &ProviderRequest) -> ProviderResponse {
    let instructions = request.messages[0].content.as_str();
    let last_is_user = request.messages.last().is_some_and(|m| m.role == Role::User);

    match instructions {
        FACTS_FINDER_INSTRUCTIONS | SOURCE_CHECKER_INSTRUCTIONS if last_is_user => {
            tool_response(vec![make_tool_call(
                "call_search",
                "search",
                serde_json::json!({"query": user_input(request)}),
            )])
        }
        FACTS_FINDER_INSTRUCTIONS => text_response(&format!(
            "Fact: {} is advancing quickly (High)\nSource: https://example.org/0",
            user_input(request)
        )),
        SOURCE_CHECKER_INSTRUCTIONS => {
            text_response("https://example.org/0 rated A\nPeer-reviewed, recent")
        }
        REPORT_WRITER_INSTRUCTIONS => {
            text_response(&format!("# Research Report\n\n{}", user_input(request)))
        }
        DIRECTOR_INSTRUCTIONS => director_script(request),
        other => panic!("unexpected agent instructions: {other}"),
    }
}

/// Plan, two parallel fact-finding calls, verification, report, answer.
fn director_script(request: &ProviderRequest) -> ProviderResponse {
    let turns = request
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .count();

    match turns {
        0 => tool_response(vec![
            make_tool_call("call_f1", "facts_finder_tool", serde_json::json!({"query": "agentic AI definitions"})),
            make_tool_call("call_f2", "facts_finder_tool", serde_json::json!({"query": "agentic AI adoption"})),
        ]),
        1 => tool_response(vec![make_tool_call(
            "call_verify",
            "source_checker_tool",
            serde_json::json!({"query": tool_outputs(request).join("\n")}),
        )]),
        2 => tool_response(vec![make_tool_call(
            "call_report",
            "report_writer_tool",
            serde_json::json!({"data": tool_outputs(request).join("\n")}),
        )]),
        _ => text_response(tool_outputs(request).last().copied().unwrap_or_default()),
    }
}

// ── Stub search ──────────────────────────────────────────────────────────

struct StubSearch {
    queries: Mutex<Vec<String>>,
    down: bool,
}

impl StubSearch {
    fn up() -> Self {
        Self { queries: Mutex::new(Vec::new()), down: false }
    }

    fn down() -> Self {
        Self { queries: Mutex::new(Vec::new()), down: true }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResponse, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.down {
            return Err(SearchError::Network("connection refused".into()));
        }
        Ok(SearchResponse {
            query: query.to_string(),
            results: (0..max_results.min(2))
                .map(|i| SearchResult {
                    title: format!("{query} #{i}"),
                    url: format!("https://example.org/{i}"),
                    snippet: format!("Snippet about {query}"),
                    score: Some(0.9),
                })
                .collect(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    model: Arc<ScriptedModel>,
    search: Arc<StubSearch>,
    log: Arc<ProgressLog>,
    runner: Runner,
}

impl Harness {
    fn new(model: ScriptedModel, search: StubSearch) -> Self {
        let model = Arc::new(model);
        let log = Arc::new(ProgressLog::default());
        let runner = Runner::new(model.clone(), RunnerConfig::new("mock").with_max_turns(10))
            .with_progress(log.clone());
        Self {
            model,
            search: Arc::new(search),
            log,
            runner,
        }
    }

    fn search_tool(&self) -> ToolRef {
        let progress: Arc<dyn ProgressSink> = self.log.clone();
        ToolRef::leaf(WebSearchTool::new(self.search.clone()).with_progress(progress))
    }

    fn count(&self, source: &str, action: &str) -> usize {
        self.log
            .entries()
            .iter()
            .filter(|e| e.source == source && e.action == action)
            .count()
    }
}

// ── E2E: Full research pipeline ──────────────────────────────────────────

#[tokio::test]
async fn e2e_director_produces_report() {
    let harness = Harness::new(ScriptedModel::new(research_script), StubSearch::up());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();

    let result = harness.runner.run(&director, "Agentic AI").await.unwrap();

    assert!(result.final_output.starts_with("# Research Report"), "{}", result.final_output);
    assert!(result.final_output.contains("rated A"));
    assert_eq!(result.turns_taken, 4);

    // Two fact-finding searches and one verification search
    let mut queries = harness.search.queries();
    queries.sort();
    assert_eq!(queries.len(), 3);
    assert!(queries.contains(&"agentic AI adoption".to_string()));
    assert!(queries.contains(&"agentic AI definitions".to_string()));

    assert_eq!(harness.count("Search Tool", "executing_query"), 3);
    assert_eq!(harness.count("Search Tool", "found_results"), 3);
    assert_eq!(harness.count("Facts Finding Agent", "started"), 2);
    assert_eq!(harness.count("Facts Finding Agent", "completed"), 2);
    assert_eq!(harness.count("Source Verification Agent", "started"), 1);
    assert_eq!(harness.count("Research Synthesis Agent", "completed"), 1);
    assert_eq!(harness.count("Research Director Agent", "run_finished"), 1);
}

#[tokio::test]
async fn e2e_parallel_fact_results_keep_request_order() {
    let harness = Harness::new(ScriptedModel::new(research_script), StubSearch::up());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();

    let result = harness.runner.run(&director, "Agentic AI").await.unwrap();

    let messages = result.transcript.messages();
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_f1"));
    assert!(messages[3].content.contains("agentic AI definitions"));
    assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_f2"));
    assert!(messages[4].content.contains("agentic AI adoption"));
}

#[tokio::test]
async fn e2e_director_requests_carry_agent_sampling() {
    let harness = Harness::new(ScriptedModel::new(research_script), StubSearch::up());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();
    harness.runner.run(&director, "Agentic AI").await.unwrap();

    let director_requests = harness.model.requests_for(DIRECTOR_INSTRUCTIONS);
    assert_eq!(director_requests.len(), 4);
    assert_eq!(director_requests[0].tool_choice, ToolChoice::Required);
    assert_eq!(director_requests[0].max_tokens, Some(2000));
    assert_eq!(director_requests[0].tools.len(), 3);

    let writer_requests = harness.model.requests_for(REPORT_WRITER_INSTRUCTIONS);
    assert_eq!(writer_requests.len(), 1);
    assert!(writer_requests[0].tools.is_empty());
    assert_eq!(writer_requests[0].max_tokens, Some(2000));

    let facts_requests = harness.model.requests_for(FACTS_FINDER_INSTRUCTIONS);
    assert_eq!(facts_requests.len(), 4);
    assert!(facts_requests.iter().all(|r| r.max_tokens == Some(800)));
}

/// Like a real backend: `required` means the reply always calls a tool.
fn strict_tool_choice_script(request: &ProviderRequest) -> ProviderResponse {
    let response = research_script(request);
    if request.tool_choice == ToolChoice::Required && !response.message.has_tool_calls() {
        return tool_response(vec![make_tool_call(
            "call_forced",
            "facts_finder_tool",
            serde_json::json!({"query": "agentic AI"}),
        )]);
    }
    response
}

#[tokio::test]
async fn e2e_director_finishes_against_strict_tool_choice() {
    let harness = Harness::new(ScriptedModel::new(strict_tool_choice_script), StubSearch::up());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();

    let result = harness.runner.run(&director, "Agentic AI").await.unwrap();
    assert!(result.final_output.starts_with("# Research Report"), "{}", result.final_output);
    assert_eq!(result.turns_taken, 4);

    let choices: Vec<_> = harness
        .model
        .requests_for(DIRECTOR_INSTRUCTIONS)
        .iter()
        .map(|r| r.tool_choice)
        .collect();
    assert_eq!(
        choices,
        vec![ToolChoice::Required, ToolChoice::Auto, ToolChoice::Auto, ToolChoice::Auto]
    );
}

#[tokio::test]
async fn e2e_search_outage_is_contained() {
    let harness = Harness::new(ScriptedModel::new(research_script), StubSearch::down());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();

    let result = harness.runner.run(&director, "Agentic AI").await.unwrap();
    assert!(result.final_output.starts_with("# Research Report"));

    // Every sub-agent saw the failure as an ordinary tool result
    let facts_requests = harness.model.requests_for(FACTS_FINDER_INSTRUCTIONS);
    let second_turns: Vec<_> = facts_requests.iter().filter(|r| r.messages.len() == 4).collect();
    assert_eq!(second_turns.len(), 2);
    assert!(second_turns
        .iter()
        .all(|r| r.messages[3].content.starts_with("search error:")));

    assert_eq!(harness.count("Search Tool", "error"), 3);
    assert_eq!(harness.count("Research Director Agent", "tool_failed"), 0);
}

#[tokio::test]
async fn e2e_sub_agent_budget_abort_is_contained() {
    let config: AppConfig = toml::from_str(
        r#"
[agents.facts_finder]
max_turns = 1
"#,
    )
    .unwrap();

    let harness = Harness::new(ScriptedModel::new(research_script), StubSearch::up());
    let director = build_director(harness.search_tool(), &config.agents).unwrap();

    let result = harness.runner.run(&director, "Agentic AI").await.unwrap();

    // Both fact-finding runs aborted after one turn; the director carried on
    let messages = result.transcript.messages();
    assert!(messages[3].content.starts_with("facts_finder_tool error:"));
    assert!(messages[3].content.contains("exceeded its budget of 1"));
    assert!(messages[4].content.starts_with("facts_finder_tool error:"));
    assert_eq!(result.turns_taken, 4);
    assert_eq!(harness.count("Facts Finding Agent", "run_aborted"), 2);
    assert_eq!(harness.count("Facts Finding Agent", "failed"), 2);
    assert_eq!(harness.count("Facts Finding Agent", "completed"), 0);
    assert_eq!(harness.count("Research Director Agent", "tool_failed"), 2);
}

#[tokio::test]
async fn e2e_director_answering_directly_is_no_tool_called() {
    let model = ScriptedModel::new(|request: &ProviderRequest| {
        if request.messages[0].content == DIRECTOR_INSTRUCTIONS {
            text_response("Agentic AI is AI that acts.")
        } else {
            research_script(request)
        }
    });
    let harness = Harness::new(model, StubSearch::up());
    let director = build_director(harness.search_tool(), &Default::default()).unwrap();

    let err = harness.runner.run(&director, "Agentic AI").await.unwrap_err();
    assert!(matches!(err, LoopError::NoToolCalled { ref agent } if agent == "Research Director Agent"));
    assert!(harness.search.queries().is_empty());
}

#[test]
fn e2e_progress_lines_render() {
    let log = ProgressLog::default();
    log.emit("Search Tool", "executing_query", "agentic AI".into());
    let rendered = log.render();
    assert!(rendered.starts_with('['));
    assert!(rendered.ends_with("] Search Tool: executing_query agentic AI"));
}
