//! Completion request and response types
//!
//! Every caller in the workspace sends one rendered prompt per call, so a
//! request starts from that prompt and is refined with `with_*` setters.

use crate::Message;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_TOKENS: usize = 1024;

/// One completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Sequences at which the endpoint cuts generation, `None` when empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl CompletionRequest {
    /// Request carrying `prompt` as its only user message
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            system: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            stop_sequences: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// `None` leaves sampling to the endpoint default
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = (!sequences.is_empty()).then_some(sequences);
        self
    }
}

/// What the endpoint returned for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    /// Cut at a stop sequence or by an endpoint-side filter
    StopSequence,
}

/// Tokens billed for one or more calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another usage record
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_prompt() {
        let request = CompletionRequest::new("gpt-4o", "Analyze")
            .with_system("You are a financial analyst")
            .with_max_tokens(2048)
            .with_temperature(Some(0.0))
            .with_stop_sequences(vec!["\nObservation:".to_string()]);

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].text(), "Analyze");
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.stop_sequences.as_deref().map(<[String]>::len), Some(1));
    }

    #[test]
    fn test_empty_stop_sequences_are_omitted() {
        let request = CompletionRequest::new("gpt-4o", "Analyze").with_stop_sequences(Vec::new());
        assert_eq!(request.stop_sequences, None);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("stop_sequences").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_token_usage() {
        let mut usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        usage.add(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        assert_eq!(usage.total(), 165);
    }
}
