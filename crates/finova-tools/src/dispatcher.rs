//! Per-session tool dispatch with memoization
//!
//! A [`ToolDispatcher`] lives for exactly one agent run. It resolves names
//! against the shared registry, runs the tool and caches successful results
//! under a canonical key so repeated identical calls are answered without
//! recomputation. Dropping the dispatcher releases the cache.

use crate::{ToolRegistry, canonical_key};
use cached::{Cached, UnboundCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a dispatch was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The tool ran
    Executed,
    /// Answered from the session cache
    Cached,
    /// No tool with that name
    NotFound,
    /// The tool returned an error
    Failed,
}

/// Result of a dispatch, always renderable as an observation
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Tool output, or a descriptive message when the call did not succeed
    pub value: Value,
    /// How the call was resolved
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    /// Whether the value came from a successful tool run
    pub fn is_success(&self) -> bool {
        matches!(self.status, DispatchStatus::Executed | DispatchStatus::Cached)
    }

    /// Text to append to the transcript
    pub fn observation(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Session-scoped dispatcher
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    cache: UnboundCache<String, Value>,
    executions: usize,
    cache_hits: usize,
}

impl ToolDispatcher {
    /// Create a dispatcher with an empty cache
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            cache: UnboundCache::new(),
            executions: 0,
            cache_hits: 0,
        }
    }

    /// Resolve and run a tool, consulting the session cache first
    ///
    /// Never fails: unknown tools and tool errors come back as descriptive
    /// outcomes the model can react to.
    pub async fn execute(&mut self, tool_name: &str, args: &Value) -> DispatchOutcome {
        let name = tool_name.trim();
        let Some(tool) = self.registry.get(name) else {
            warn!(tool_name = %name, "Unknown tool requested");
            return DispatchOutcome {
                value: Value::String(format!(
                    "{name} is not a valid tool, try one of [{}].",
                    self.registry.tool_names()
                )),
                status: DispatchStatus::NotFound,
            };
        };

        let key = canonical_key(name, args);
        if let Some(value) = self.cache.cache_get(&key) {
            self.cache_hits += 1;
            debug!(tool_name = %name, cache_key = %key, "Tool cache hit");
            return DispatchOutcome {
                value: value.clone(),
                status: DispatchStatus::Cached,
            };
        }

        let start = Instant::now();
        self.executions += 1;
        match tool.execute(args.clone()).await {
            Ok(value) => {
                info!(
                    tool_name = %name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution succeeded"
                );
                let _ = self.cache.cache_set(key, value.clone());
                DispatchOutcome {
                    value,
                    status: DispatchStatus::Executed,
                }
            }
            Err(e) => {
                warn!(tool_name = %name, error = %e, "Tool execution failed");
                DispatchOutcome {
                    value: Value::String(format!("Error: {e}")),
                    status: DispatchStatus::Failed,
                }
            }
        }
    }

    /// Number of times a tool actually ran
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// Number of calls answered from the cache
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    /// Number of memoized results
    pub fn cached_entries(&self) -> usize {
        self.cache.cache_size()
    }

    /// The shared registry this dispatcher resolves against
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tool;
    use async_trait::async_trait;
    use finova_core::{Error, Result};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sums a JSON array and counts how often it really ran
    struct CountingSum {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingSum {
        async fn execute(&self, params: Value) -> Result<Value> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let values = params
                .as_array()
                .ok_or_else(|| Error::InvalidInput("expected an array".to_string()))?;
            Ok(json!(values.iter().filter_map(Value::as_f64).sum::<f64>()))
        }

        fn name(&self) -> &str {
            "total"
        }

        fn description(&self) -> &str {
            "Sum of numbers"
        }

        fn input_schema(&self) -> Value {
            json!({})
        }
    }

    fn setup() -> (ToolDispatcher, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::builder()
            .register(Arc::new(CountingSum {
                runs: Arc::clone(&runs),
            }))
            .build()
            .unwrap();
        (ToolDispatcher::new(Arc::new(registry)), runs)
    }

    #[tokio::test]
    async fn test_repeat_call_served_from_cache() {
        let (mut dispatcher, runs) = setup();

        let first = dispatcher.execute("total", &json!([1, 2, 3])).await;
        let second = dispatcher.execute("total", &json!([1, 2, 3])).await;

        assert_eq!(first.value, second.value);
        assert_eq!(first.status, DispatchStatus::Executed);
        assert_eq!(second.status, DispatchStatus::Cached);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.executions(), 1);
        assert_eq!(dispatcher.cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_logically_equal_args_share_entry() {
        let (mut dispatcher, runs) = setup();

        dispatcher.execute("total", &json!([1, 2, 3])).await;
        dispatcher.execute(" total", &json!([1.0, 2.0, 3.0])).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_cache() {
        let (mut first, runs) = setup();
        first.execute("total", &json!([4])).await;

        let mut second = ToolDispatcher::new(Arc::clone(first.registry()));
        second.execute("total", &json!([4])).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_observation() {
        let (mut dispatcher, _) = setup();

        let outcome = dispatcher.execute("sum", &json!([1])).await;
        assert_eq!(outcome.status, DispatchStatus::NotFound);
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.observation(),
            "sum is not a valid tool, try one of [total]."
        );
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (mut dispatcher, runs) = setup();

        let outcome = dispatcher.execute("total", &json!("oops")).await;
        assert_eq!(outcome.status, DispatchStatus::Failed);
        assert!(outcome.observation().starts_with("Error:"));

        dispatcher.execute("total", &json!("oops")).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.cached_entries(), 0);
    }
}
