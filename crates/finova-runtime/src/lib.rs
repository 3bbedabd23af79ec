//! ReAct agent loop for finova-rs
//!
//! The loop drives a model through `Thought → Action → Observation` cycles:
//!
//! 1. Render the prompt with the transcript so far
//! 2. Ask the model for the next step
//! 3. Classify the output ([`ReActStep`])
//! 4. Dispatch actions through a session-scoped [`finova_tools::ToolDispatcher`]
//! 5. Stop on a final answer or when a budget runs out
//!
//! Free text from the model is never executed; it is parsed into a small
//! tagged set and only known tools can be invoked.

pub mod executor;
pub mod react;
pub mod retry;
pub mod transcript;

pub use executor::{
    ExecutorConfig, ExecutorEventHandler, PromptRenderer, ReActExecutor, ReActExecutorBuilder,
    RunError, RunOutcome, RunStatus,
};
pub use react::{MalformedReason, ReActStep, parse_action_input, parse_react_output};
pub use retry::RetryPolicy;
pub use transcript::{Transcript, TranscriptEntry};
