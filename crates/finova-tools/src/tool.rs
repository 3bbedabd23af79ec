//! Tool trait definition

use async_trait::async_trait;
use finova_core::Result;
use serde_json::Value;

/// Trait for tools that agents can execute
///
/// Tools must be deterministic for a given input: the dispatcher caches
/// results by (name, arguments) for the lifetime of a session.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// `params` is whatever the model supplied as the action input, already
    /// decoded from JSON when possible. Tools normalize loosely typed input
    /// themselves.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Tool name, unique within a registry
    fn name(&self) -> &str;

    /// Natural-language usage contract shown to the model
    fn description(&self) -> &str;

    /// Declared parameter shapes (JSON Schema)
    fn input_schema(&self) -> Value;
}

/// Helpers to build JSON schemas for tool inputs
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with properties
    ///
    /// ```
    /// use finova_tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "part": schema::number("Portion"), "whole": schema::number("Total") }),
    ///     &["part", "whole"],
    /// );
    /// assert_eq!(schema["required"][1], "whole");
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// String property schema
    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    /// Number property schema
    pub fn number(description: &str) -> Value {
        json!({
            "type": "number",
            "description": description,
        })
    }

    /// Array property schema
    pub fn array(description: &str, items: Value) -> Value {
        json!({
            "type": "array",
            "description": description,
            "items": items,
        })
    }

    /// Property accepting any of the given schemas
    pub fn any_of(description: &str, variants: Vec<Value>) -> Value {
        json!({
            "description": description,
            "anyOf": variants,
        })
    }
}
