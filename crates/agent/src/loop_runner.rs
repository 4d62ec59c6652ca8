//! The execution loop.
//!
//! [`Runner`] drives one [`AgentDefinition`] from its input to a final
//! answer: call the model, dispatch any requested tools concurrently, append
//! their results in request order, repeat. Agent tools recurse into a fresh
//! loop with its own transcript and a child cancellation token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deepdive_core::agent::{AgentDefinition, ToolChoice};
use deepdive_core::error::LoopError;
use deepdive_core::event::{NullSink, ProgressSink};
use deepdive_core::message::{Message, Transcript};
use deepdive_core::provider::{Provider, ProviderRequest, Usage};
use deepdive_core::tool::{AgentInvoker, AgentTool, ToolCall, ToolRegistry, ToolResult};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Limits and defaults shared by every loop a [`Runner`] drives.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Model used by agents without their own override
    pub model: String,

    /// Model turns per loop invocation, unless the agent overrides it
    pub max_turns: u32,

    /// Wall-clock limit for a top-level run
    pub timeout: Option<Duration>,
}

impl RunnerConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_turns: 25,
            timeout: None,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("gemini-2.5-flash")
    }
}

/// The outcome of a finished loop.
#[derive(Debug, Clone)]
pub struct LoopResult {
    /// Content of the final assistant message
    pub final_output: String,

    /// Model calls made
    pub turns_taken: u32,

    /// Token usage summed over every turn that reported it
    pub usage: Usage,

    /// The full transcript, for diagnostics
    pub transcript: Transcript,
}

/// Drives agent loops against one Model Client.
pub struct Runner {
    provider: Arc<dyn Provider>,
    progress: Arc<dyn ProgressSink>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(provider: Arc<dyn Provider>, config: RunnerConfig) -> Self {
        Self {
            provider,
            progress: Arc::new(NullSink),
            config,
        }
    }

    /// Report loop activity to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `definition` on `input` until it produces a final answer.
    pub async fn run(
        &self,
        definition: &AgentDefinition,
        input: &str,
    ) -> Result<LoopResult, LoopError> {
        self.run_with_cancel(definition, input, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops early when `token` is cancelled.
    ///
    /// Cancellation reaches the in-flight model call, every in-flight tool
    /// call and every nested agent run. Partial results are discarded.
    pub async fn run_with_cancel(
        &self,
        definition: &AgentDefinition,
        input: &str,
        token: CancellationToken,
    ) -> Result<LoopResult, LoopError> {
        let Some(limit) = self.config.timeout else {
            return self.execute(definition, input, token).await;
        };

        let run_token = token.child_token();
        match tokio::time::timeout(limit, self.execute(definition, input, run_token.clone())).await
        {
            Ok(result) => result,
            Err(_) => {
                run_token.cancel();
                Err(self.abort(LoopError::TimedOut {
                    agent: definition.name.clone(),
                    timeout: limit,
                }))
            }
        }
    }

    async fn execute(
        &self,
        definition: &AgentDefinition,
        input: &str,
        token: CancellationToken,
    ) -> Result<LoopResult, LoopError> {
        let agent = definition.name.as_str();
        let max_turns = definition.max_turns.unwrap_or(self.config.max_turns);
        let model = definition
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let tools = definition.tools().definitions();

        let mut transcript = Transcript::start(&definition.instructions, input);
        let mut usage = Usage::default();
        let mut turns = 0u32;

        info!(agent, %model, max_turns, tools = tools.len(), "Starting agent run");
        self.progress.emit(agent, "run_started", preview(input, 100));

        loop {
            if turns >= max_turns {
                warn!(agent, max_turns, "Turn budget exhausted");
                return Err(self.abort(LoopError::BudgetExceeded {
                    agent: agent.to_string(),
                    max_turns,
                    transcript: Box::new(transcript),
                }));
            }
            turns += 1;

            // `required` only binds the first turn.
            let tool_choice = match definition.sampling.tool_choice {
                ToolChoice::Required if turns > 1 => ToolChoice::Auto,
                choice => choice,
            };

            let request = ProviderRequest {
                model: model.clone(),
                messages: transcript.messages().to_vec(),
                temperature: definition.sampling.temperature,
                max_tokens: Some(definition.sampling.max_tokens),
                tools: tools.clone(),
                tool_choice,
            };

            debug!(agent, turn = turns, messages = transcript.len(), "Calling model");
            self.progress
                .emit(agent, "model_turn", format!("turn {turns}/{max_turns}"));

            let response = match cancellable(&token, self.provider.complete(request)).await {
                Some(Ok(response)) => response,
                Some(Err(source)) => {
                    return Err(self.abort(LoopError::ModelUnavailable {
                        agent: agent.to_string(),
                        source,
                    }));
                }
                None => return Err(self.cancelled(agent)),
            };

            if let Some(turn_usage) = &response.usage {
                usage.add(turn_usage);
            }

            let message = response.message;
            if !message.has_tool_calls() {
                if turns == 1 && definition.sampling.tool_choice == ToolChoice::Required {
                    return Err(self.abort(LoopError::NoToolCalled {
                        agent: agent.to_string(),
                    }));
                }

                let final_output = message.content.clone();
                transcript.push(message);

                info!(agent, turns, total_tokens = usage.total_tokens, "Agent run finished");
                self.progress
                    .emit(agent, "run_finished", format!("{turns} turns"));

                return Ok(LoopResult {
                    final_output,
                    turns_taken: turns,
                    usage,
                    transcript,
                });
            }

            let calls: Vec<ToolCall> = message.tool_calls.iter().map(ToolCall::from).collect();
            transcript.push(message);

            let results = match cancellable(
                &token,
                self.dispatch(agent, definition.tools(), &calls, &token),
            )
            .await
            {
                Some(results) => results,
                None => return Err(self.cancelled(agent)),
            };

            for result in results {
                transcript.push(Message::tool_result(result.call_id, result.output));
            }
        }
    }

    /// Invoke every call of one turn concurrently.
    ///
    /// Results come back in request order whatever the completion order.
    async fn dispatch(
        &self,
        agent: &str,
        tools: &ToolRegistry,
        calls: &[ToolCall],
        token: &CancellationToken,
    ) -> Vec<ToolResult> {
        debug!(agent, count = calls.len(), "Dispatching tool calls");
        let nested = NestedRun {
            runner: self,
            token: token.clone(),
        };
        join_all(calls.iter().map(|call| self.dispatch_one(agent, tools, call, &nested))).await
    }

    async fn dispatch_one(
        &self,
        agent: &str,
        tools: &ToolRegistry,
        call: &ToolCall,
        nested: &NestedRun<'_>,
    ) -> ToolResult {
        self.progress.emit(
            agent,
            "tool_started",
            format!("{} {}", call.name, preview(&call.arguments, 120)),
        );

        let start = Instant::now();
        let result = tools.invoke(call, nested).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if result.success {
            debug!(agent, tool = %call.name, duration_ms, "Tool completed");
            self.progress.emit(
                agent,
                "tool_completed",
                format!("{} in {duration_ms}ms", call.name),
            );
        } else {
            warn!(agent, tool = %call.name, duration_ms, output = %result.output, "Tool failed");
            self.progress
                .emit(agent, "tool_failed", preview(&result.output, 200));
        }

        result
    }

    fn cancelled(&self, agent: &str) -> LoopError {
        self.abort(LoopError::Cancelled {
            agent: agent.to_string(),
        })
    }

    fn abort(&self, error: LoopError) -> LoopError {
        let agent = match &error {
            LoopError::BudgetExceeded { agent, .. }
            | LoopError::NoToolCalled { agent }
            | LoopError::ModelUnavailable { agent, .. }
            | LoopError::TimedOut { agent, .. }
            | LoopError::Cancelled { agent } => agent.clone(),
        };
        self.progress.emit(&agent, "run_aborted", error.to_string());
        error
    }
}

/// Runs agent tools for one dispatching loop.
struct NestedRun<'a> {
    runner: &'a Runner,
    token: CancellationToken,
}

#[async_trait]
impl AgentInvoker for NestedRun<'_> {
    async fn invoke_agent(&self, tool: &AgentTool, input: String) -> Result<String, LoopError> {
        let definition = tool.definition();
        let progress = &self.runner.progress;

        progress.emit(
            &definition.name,
            "started",
            format!("{} {}", tool.name(), preview(&input, 100)),
        );

        let result = match self
            .runner
            .execute(definition, &input, self.token.child_token())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                progress.emit(&definition.name, "failed", e.to_string());
                return Err(e);
            }
        };

        progress.emit(
            &definition.name,
            "completed",
            format!(
                "{} lines, {} characters",
                result.final_output.lines().count(),
                result.final_output.len()
            ),
        );
        Ok(result.final_output)
    }
}

/// Await `fut` unless `token` fires first.
async fn cancellable<F: std::future::Future>(
    token: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        _ = token.cancelled() => None,
        value = fut => Some(value),
    }
}

/// At most `max_chars` characters of `text`, marked when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
