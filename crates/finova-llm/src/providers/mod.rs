//! Concrete LLM provider implementations

#[cfg(feature = "openai")]
mod openai;
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

#[cfg(any(feature = "mock", test))]
mod mock;
#[cfg(any(feature = "mock", test))]
pub use mock::ScriptedProvider;
