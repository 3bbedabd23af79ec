//! LLM provider abstraction layer for finova-rs
//!
//! Provider-agnostic types for talking to a language model:
//!
//! - Message types
//! - Completion request/response types
//! - The [`LLMProvider`] trait
//! - Concrete providers (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

#[cfg(any(feature = "openai", feature = "mock", test))]
pub mod providers;
