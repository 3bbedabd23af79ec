//! Immutable tool registry
//!
//! The registry is assembled once at startup and shared read-only behind an
//! `Arc`. Registration order is preserved so the catalog shown to the model
//! is stable.

use crate::Tool;
use finova_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed set of tools available to agents
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Start assembling a registry
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index
            .get(name.trim())
            .map(|&i| Arc::clone(&self.tools[i]))
    }

    /// All tools in registration order
    pub fn list_tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Comma-separated tool names
    pub fn tool_names(&self) -> String {
        self.names().join(", ")
    }

    /// One `name: description` line per tool
    pub fn catalog(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Builder for [`ToolRegistry`]
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Freeze the registry, rejecting duplicate or blank names
    pub fn build(self) -> Result<ToolRegistry> {
        let mut index = HashMap::with_capacity(self.tools.len());

        for (i, tool) in self.tools.iter().enumerate() {
            let name = tool.name();
            if name.trim().is_empty() || name.trim() != name {
                return Err(Error::InitializationFailed(format!(
                    "invalid tool name '{name}'"
                )));
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(Error::InitializationFailed(format!(
                    "duplicate tool name '{name}'"
                )));
            }
        }

        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        async fn execute(&self, params: Value) -> Result<Value> {
            Ok(params)
        }

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        fn input_schema(&self) -> Value {
            json!({})
        }
    }

    #[test]
    fn test_catalog_order() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Named("b_tool")))
            .register(Arc::new(Named("a_tool")))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), "b_tool, a_tool");
        assert_eq!(
            registry.catalog(),
            "b_tool: echoes its input\na_tool: echoes its input"
        );
    }

    #[test]
    fn test_lookup_trims_name() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Named("calculate_total")))
            .build()
            .unwrap();

        assert!(registry.get(" calculate_total\n").is_some());
        assert!(registry.get("calculate_sum").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ToolRegistry::builder()
            .register(Arc::new(Named("x")))
            .register(Arc::new(Named("x")))
            .build();
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = ToolRegistry::builder()
            .register(Arc::new(Named(" ")))
            .build();
        assert!(result.is_err());
    }
}
