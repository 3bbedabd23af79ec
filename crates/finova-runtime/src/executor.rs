//! Budgeted ReAct executor
//!
//! [`ReActExecutor`] implements the agent loop:
//! 1. Render the prompt with the transcript so far
//! 2. Call the model, stopping before it invents an observation
//! 3. Classify the output and either dispatch a tool, inject a correction,
//!    or return the final answer
//! 4. Check the iteration, time, token and correction budgets
//!
//! Budget exhaustion is not an error: the run ends with the best partial
//! output and a [`RunStatus`] naming the budget that ran out.

use crate::react::{ReActStep, parse_react_output};
use crate::retry::RetryPolicy;
use crate::transcript::Transcript;
use async_trait::async_trait;
use finova_llm::{CompletionRequest, LLMError, LLMProvider, TokenUsage};
use finova_tools::{DispatchOutcome, DispatchStatus, ToolDispatcher, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Produces the full prompt for the next model call
pub trait PromptRenderer: Send + Sync {
    /// Render the prompt around the transcript text accumulated so far
    fn render(&self, scratchpad: &str) -> finova_core::Result<String>;
}

/// Event handler for agent execution events
///
/// All callbacks default to no-ops.
#[async_trait]
pub trait ExecutorEventHandler: Send + Sync {
    /// Called after each model output is classified
    async fn on_step(&self, _iteration: usize, _step: &ReActStep) {}

    /// Called when a tool execution starts
    async fn on_tool_start(&self, _name: &str, _input: &Value) {}

    /// Called when a tool execution completes
    async fn on_tool_done(&self, _name: &str, _outcome: &DispatchOutcome, _duration_ms: u64) {}

    /// Called when the run ends with an outcome
    async fn on_complete(&self, _status: RunStatus, _output: &str) {}

    /// Called when the run ends with an error
    async fn on_error(&self, _error: &str) {}
}

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of model calls (prevents infinite loops)
    pub max_iterations: usize,

    /// Protocol violations tolerated before giving up
    pub max_corrections: usize,

    /// Wall-clock budget for one run
    pub time_budget: Option<Duration>,

    /// Total tokens (input + output) budget for one run
    pub token_budget: Option<usize>,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,

    /// Sequences that end a completion
    pub stop_sequences: Vec<String>,

    /// Handling of transient model failures
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_corrections: 3,
            time_budget: Some(Duration::from_secs(180)),
            token_budget: None,
            model: "gpt-4o".to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: Some(0.0),
            stop_sequences: vec!["\nObservation:".to_string()],
            retry: RetryPolicy::default(),
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model gave a final answer
    Completed,
    /// `max_iterations` model calls were made
    IterationLimit,
    /// The wall-clock budget ran out
    TimeLimit,
    /// The token budget ran out
    TokenLimit,
    /// Too many protocol violations
    CorrectionLimit,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::IterationLimit => "iteration_limit",
            Self::TimeLimit => "time_limit",
            Self::TokenLimit => "token_limit",
            Self::CorrectionLimit => "correction_limit",
        }
    }
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final answer, or the best partial output when a budget ran out
    pub output: String,
    pub status: RunStatus,
    pub transcript: Transcript,
    /// Model calls made, retries included
    pub iterations: usize,
    pub usage: TokenUsage,
    /// Tool runs that were not answered from the cache
    pub tool_executions: usize,
    pub cache_hits: usize,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Errors that end a run without an outcome
#[derive(Debug, Error)]
pub enum RunError {
    #[error("agent run cancelled")]
    Cancelled,

    #[error("model call failed after {attempts} attempt(s): {source}")]
    Model {
        attempts: u32,
        #[source]
        source: LLMError,
    },

    #[error(transparent)]
    Prompt(#[from] finova_core::Error),
}

impl From<RunError> for finova_core::Error {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Cancelled => Self::Cancelled,
            RunError::Model { .. } => Self::ProcessingFailed(err.to_string()),
            RunError::Prompt(inner) => inner,
        }
    }
}

/// Mutable state of one run
struct RunState {
    started: Instant,
    dispatcher: ToolDispatcher,
    transcript: Transcript,
    usage: TokenUsage,
    iterations: usize,
    corrections: usize,
    last_json_output: Option<String>,
}

/// Executes the ReAct loop: model → parse → tool → observation → loop back
pub struct ReActExecutor {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl ReActExecutor {
    /// Create a new executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            event_handler: None,
        }
    }

    /// Set the event handler for receiving execution events
    pub fn with_event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run the loop until a final answer, a budget limit, cancellation or
    /// a model failure
    ///
    /// The tool cache and transcript are created here and dropped with the
    /// run.
    pub async fn run(
        &self,
        prompt: &dyn PromptRenderer,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let result = self.run_inner(prompt, cancel).await;
        if let Some(handler) = &self.event_handler {
            match &result {
                Ok(outcome) => handler.on_complete(outcome.status, &outcome.output).await,
                Err(e) => handler.on_error(&e.to_string()).await,
            }
        }
        result
    }

    async fn run_inner(
        &self,
        prompt: &dyn PromptRenderer,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let mut state = RunState {
            started: Instant::now(),
            dispatcher: ToolDispatcher::new(Arc::clone(&self.registry)),
            transcript: Transcript::new(),
            usage: TokenUsage::default(),
            iterations: 0,
            corrections: 0,
            last_json_output: None,
        };
        let deadline = self.config.time_budget.map(|budget| state.started + budget);
        let mut consecutive_failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            if let Some(status) = self.exhausted_budget(&state) {
                return Ok(self.partial(state, status));
            }

            state.iterations += 1;
            info!(
                iteration = state.iterations,
                max_iterations = self.config.max_iterations,
                "Agent iteration started"
            );

            let request = self.build_request(prompt.render(&state.transcript.render())?);
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RunError::Cancelled),
                () = sleep_until(deadline) => {
                    warn!(iteration = state.iterations, "Time budget ran out during model call");
                    return Ok(self.partial(state, RunStatus::TimeLimit));
                }
                response = self.provider.complete(request) => response,
            };

            let response = match response {
                Ok(response) => {
                    consecutive_failures = 0;
                    response
                }
                Err(e) if e.is_retryable() => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.retry.max_attempts {
                        warn!(error = %e, attempts = consecutive_failures, "Model retries exhausted");
                        return Err(RunError::Model {
                            attempts: consecutive_failures,
                            source: e,
                        });
                    }
                    let backoff = self.config.retry.backoff_duration(consecutive_failures);
                    warn!(
                        error = %e,
                        attempt = consecutive_failures,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient model failure, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(RunError::Cancelled),
                        () = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Model call failed");
                    return Err(RunError::Model {
                        attempts: consecutive_failures + 1,
                        source: e,
                    });
                }
            };

            state.usage.add(response.usage);
            let text = response.message.text();
            debug!(
                stop_reason = ?response.stop_reason,
                output_tokens = response.usage.output_tokens,
                preview = %text.chars().take(200).collect::<String>(),
                "Model output received"
            );

            let step = parse_react_output(text);
            if let Some(handler) = &self.event_handler {
                handler.on_step(state.iterations, &step).await;
            }
            if !matches!(step, ReActStep::Action { .. }) && text.contains('{') {
                state.last_json_output = Some(text.trim().to_string());
            }

            match step {
                ReActStep::FinalAnswer { answer, .. } => {
                    info!(
                        iterations = state.iterations,
                        tool_executions = state.dispatcher.executions(),
                        "Agent produced a final answer"
                    );
                    return Ok(self.finish(state, RunStatus::Completed, answer));
                }
                ReActStep::Action {
                    thought,
                    tool,
                    input,
                } => {
                    if let Some(handler) = &self.event_handler {
                        handler.on_tool_start(&tool, &input).await;
                    }
                    let started = Instant::now();
                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(RunError::Cancelled),
                        outcome = state.dispatcher.execute(&tool, &input) => outcome,
                    };
                    if let Some(handler) = &self.event_handler {
                        handler
                            .on_tool_done(&tool, &outcome, started.elapsed().as_millis() as u64)
                            .await;
                    }
                    let not_found = outcome.status == DispatchStatus::NotFound;
                    state
                        .transcript
                        .push_step(thought, tool, input, outcome.observation());
                    if not_found {
                        state.corrections += 1;
                        if state.corrections > self.config.max_corrections {
                            return Ok(self.partial(state, RunStatus::CorrectionLimit));
                        }
                    }
                }
                step @ (ReActStep::Thought { .. } | ReActStep::Malformed { .. }) => {
                    let instruction = step.correction().unwrap_or_default();
                    state.corrections += 1;
                    if state.corrections > self.config.max_corrections {
                        warn!(
                            corrections = state.corrections,
                            "Correction budget exhausted"
                        );
                        return Ok(self.partial(state, RunStatus::CorrectionLimit));
                    }
                    debug!(instruction, "Injecting format correction");
                    state.transcript.push_correction(instruction);
                }
            }
        }
    }

    fn exhausted_budget(&self, state: &RunState) -> Option<RunStatus> {
        if state.iterations >= self.config.max_iterations {
            warn!(
                max_iterations = self.config.max_iterations,
                "Max iterations reached, stopping"
            );
            return Some(RunStatus::IterationLimit);
        }
        if self
            .config
            .time_budget
            .is_some_and(|budget| state.started.elapsed() >= budget)
        {
            warn!("Time budget exhausted, stopping");
            return Some(RunStatus::TimeLimit);
        }
        if self
            .config
            .token_budget
            .is_some_and(|budget| state.usage.total() >= budget)
        {
            warn!(tokens = state.usage.total(), "Token budget exhausted, stopping");
            return Some(RunStatus::TokenLimit);
        }
        None
    }

    fn build_request(&self, prompt: String) -> CompletionRequest {
        let request = CompletionRequest::new(&self.config.model, prompt)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_stop_sequences(self.config.stop_sequences.clone());
        match &self.config.system_prompt {
            Some(system) => request.with_system(system.clone()),
            None => request,
        }
    }

    /// Best available output when no final answer was given
    fn partial(&self, mut state: RunState, status: RunStatus) -> RunOutcome {
        let output = state
            .last_json_output
            .take()
            .unwrap_or_else(|| state.transcript.render());
        self.finish(state, status, output)
    }

    fn finish(&self, state: RunState, status: RunStatus, output: String) -> RunOutcome {
        RunOutcome {
            output,
            status,
            iterations: state.iterations,
            usage: state.usage,
            tool_executions: state.dispatcher.executions(),
            cache_hits: state.dispatcher.cache_hits(),
            transcript: state.transcript,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Builder for ReActExecutor
pub struct ReActExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    registry: Option<Arc<ToolRegistry>>,
    config: ExecutorConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl ReActExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            registry: None,
            config: ExecutorConfig::default(),
            event_handler: None,
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the correction budget
    pub fn max_corrections(mut self, max: usize) -> Self {
        self.config.max_corrections = max;
        self
    }

    /// Set the wall-clock budget; `None` disables it
    pub fn time_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.time_budget = budget;
        self
    }

    /// Set the token budget
    pub fn token_budget(mut self, budget: usize) -> Self {
        self.config.token_budget = Some(budget);
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the retry policy for transient model failures
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the event handler
    pub fn event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the executor
    pub fn build(self) -> finova_core::Result<ReActExecutor> {
        let provider = self.provider.ok_or_else(|| {
            finova_core::Error::InitializationFailed("Provider not set".to_string())
        })?;
        let registry = self.registry.ok_or_else(|| {
            finova_core::Error::InitializationFailed("Tool registry not set".to_string())
        })?;
        if self.config.max_iterations == 0 {
            return Err(finova_core::Error::InitializationFailed(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        Ok(ReActExecutor {
            provider,
            registry,
            config: self.config,
            event_handler: self.event_handler,
        })
    }
}

impl Default for ReActExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
