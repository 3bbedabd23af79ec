//! Scripted provider for tests
//!
//! Replays a fixed sequence of completions (or errors) and records every
//! request it receives.

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Provider that answers from a script
///
/// ```
/// use finova_llm::providers::ScriptedProvider;
///
/// let provider = ScriptedProvider::new(["Thought: one", "Final Answer: {}"]);
/// assert_eq!(provider.call_count(), 0);
/// ```
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
    usage_per_call: TokenUsage,
}

impl ScriptedProvider {
    /// Replay the given texts in order, failing once they run out
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            usage_per_call: TokenUsage::default(),
        }
    }

    /// Answer every call with the same text
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Append a successful completion to the script
    pub fn then(self, text: impl Into<String>) -> Self {
        self.lock_script().push_back(Ok(text.into()));
        self
    }

    /// Append a failure to the script
    pub fn then_error(self, error: LLMError) -> Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Report this usage for every completion
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage_per_call = usage;
        self
    }

    /// Number of completion calls received
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copies of every request received
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let next = self.lock_script().pop_front();
        let text = match next {
            Some(entry) => entry?,
            None => self.fallback.clone().ok_or_else(|| {
                LLMError::UnexpectedResponse("scripted provider ran out of responses".to_string())
            })?,
        };

        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: self.usage_per_call,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
