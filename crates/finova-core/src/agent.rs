//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// Core trait that all agents must implement
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process input and return output
    ///
    /// Input and output are plain strings; agents that work with structured
    /// data parse and serialize JSON at this boundary.
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
