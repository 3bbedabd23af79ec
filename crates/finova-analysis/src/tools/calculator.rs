//! Free-form arithmetic tool with optional model translation

use async_trait::async_trait;
use finova_core::Result;
use finova_llm::{CompletionRequest, LLMError, LLMProvider};
use finova_runtime::RetryPolicy;
use finova_tools::{Tool, schema};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::expression::evaluate;

const TRANSLATE_SYSTEM_PROMPT: &str = "Translate the user's math problem into a single \
arithmetic expression. Use only numbers, + - * / ^ %, parentheses and the functions \
sqrt, abs, round, min, max, ln, log10, exp. Reply with the expression only, no words \
and no result.";

/// Evaluates arithmetic expressions, asking a model to rewrite prose first
///
/// The model only ever produces an expression; the number always comes
/// from local evaluation.
pub struct AdvancedCalculator {
    translator: Option<Translator>,
}

struct Translator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    retry: RetryPolicy,
}

impl AdvancedCalculator {
    /// Calculator with local evaluation only
    pub fn new() -> Self {
        Self { translator: None }
    }

    /// Calculator that falls back to model translation
    pub fn with_model(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            translator: Some(Translator {
                provider,
                model: model.into(),
                retry: RetryPolicy::default(),
            }),
        }
    }

    /// Set the retry policy used for translation calls
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        if let Some(translator) = self.translator.as_mut() {
            translator.retry = retry;
        }
        self
    }

    async fn calculate(&self, problem: &str) -> Result<f64> {
        let local_error = match evaluate(problem) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some(translator) = &self.translator else {
            return Err(finova_core::Error::InvalidInput(format!(
                "cannot evaluate '{problem}': {local_error}"
            )));
        };

        debug!(problem, error = %local_error, "Local evaluation failed, translating");
        let expression = translator.translate(problem).await?;
        evaluate(&expression).map_err(|e| {
            warn!(problem, expression = %expression, error = %e, "Translated expression rejected");
            finova_core::Error::ProcessingFailed(format!(
                "cannot evaluate '{expression}' (from '{problem}'): {e}"
            ))
        })
    }
}

impl Default for AdvancedCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    async fn translate(&self, problem: &str) -> Result<String> {
        let response = self
            .retry
            .execute(
                "translate_expression",
                || {
                    let request = CompletionRequest::new(&self.model, problem)
                        .with_system(TRANSLATE_SYSTEM_PROMPT)
                        .with_max_tokens(256)
                        .with_temperature(Some(0.0));
                    self.provider.complete(request)
                },
                LLMError::is_retryable,
            )
            .await
            .map_err(|e| finova_core::Error::ProcessingFailed(format!("translation failed: {e}")))?;

        Ok(clean_expression(response.message.text()))
    }
}

/// Strip fences, backticks and a trailing `= ...` from a model reply
fn clean_expression(reply: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))
        .unwrap_or_default();
    let line = line.trim_matches('`');
    let line = line.split('=').next().unwrap_or(line);
    line.trim().to_string()
}

fn problem_text(params: &Value) -> Option<String> {
    match params {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["expression", "expr", "input", "query", "problem"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(problem_text),
        _ => None,
    }
}

#[async_trait]
impl Tool for AdvancedCalculator {
    async fn execute(&self, params: Value) -> Result<Value> {
        let problem = problem_text(&params)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                finova_core::Error::InvalidInput(
                    "expected an expression string or {\"expression\": \"...\"}".to_string(),
                )
            })?;

        Ok(json!(self.calculate(&problem).await?))
    }

    fn name(&self) -> &str {
        "advanced_calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression such as \"(1720 - 970) / 1720 * 100\" or \
         \"sqrt(16) + 2^3\". Supports + - * / ^ %, parentheses, sqrt, abs, round, min, \
         max, ln, log10, exp, pi and e. Use it for any calculation the other tools do \
         not cover."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({ "expression": schema::string("Arithmetic expression to evaluate") }),
            &["expression"],
        )
    }
}
