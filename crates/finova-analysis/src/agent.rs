//! Financial analysis agent
//!
//! Wraps the ReAct loop with the financial toolbox, the analysis prompt and
//! the extraction pipeline. Each analysis makes up to `max_attempts` runs
//! and always ends with a well-formed output object.

use async_trait::async_trait;
use finova_core::{Agent, Context};
use finova_llm::{LLMProvider, TokenUsage};
use finova_prompt::JinjaTemplate;
use finova_runtime::{ExecutorEventHandler, ReActExecutor, RunError, RunOutcome, RunStatus};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::extract::{Extraction, ExtractionSource, Extractor};
use crate::prompts::{FinancialPrompt, financial_template};
use crate::request::AnalysisRequest;
use crate::schema::ValidationReport;
use crate::toolbox::financial_toolbox;
use crate::tools::{AdvancedCalculator, HistoricalDataSource, InMemoryHistoricalSource};

/// Result of one analysis
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub session_id: Uuid,
    /// The output object, complete in every required field
    pub output: Value,
    pub source: ExtractionSource,
    pub filled_fields: Vec<String>,
    pub report: ValidationReport,
    /// Agent runs made
    pub attempts: usize,
    /// How the run that produced `output` ended
    pub status: RunStatus,
    /// Model calls across all runs
    pub iterations: usize,
    pub usage: TokenUsage,
    pub tool_executions: usize,
    pub cache_hits: usize,
}

#[derive(Default)]
struct Totals {
    iterations: usize,
    usage: TokenUsage,
    tool_executions: usize,
    cache_hits: usize,
}

impl Totals {
    fn add(&mut self, outcome: &RunOutcome) {
        self.iterations += outcome.iterations;
        self.usage.add(outcome.usage);
        self.tool_executions += outcome.tool_executions;
        self.cache_hits += outcome.cache_hits;
    }
}

/// Agent producing structured financial statements from raw figures
pub struct FinancialAgent {
    executor: ReActExecutor,
    template: JinjaTemplate,
    config: AnalysisConfig,
}

impl FinancialAgent {
    pub fn builder() -> FinancialAgentBuilder {
        FinancialAgentBuilder::new()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one request
    ///
    /// The first run whose output holds a JSON object is extracted.
    /// Otherwise the last output goes through extraction of last resort.
    /// Fails only when cancelled, when the prompt cannot be rendered, or
    /// when every run failed at the model.
    #[instrument(
        skip(self, request, cancel),
        fields(company = request.company_name().unwrap_or("unknown"))
    )]
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let session_id = Uuid::new_v4();
        let extractor = Extractor::for_request(request);
        let prompt = FinancialPrompt::new(&self.template, request, self.executor.registry());
        info!(%session_id, max_attempts = self.config.max_attempts, "Starting financial analysis");

        let mut totals = Totals::default();
        let mut last: Option<(Extraction, RunStatus)> = None;
        let mut model_error: Option<RunError> = None;
        let mut attempts = 0;

        for attempt in 1..=self.config.max_attempts {
            attempts = attempt;
            match self.executor.run(&prompt, cancel).await {
                Ok(outcome) => {
                    totals.add(&outcome);
                    let extraction = extractor.extract_str(&outcome.output);
                    if extraction.source.is_parsed() {
                        info!(
                            %session_id,
                            attempt,
                            status = outcome.status.as_str(),
                            source = extraction.source.as_str(),
                            "Financial analysis produced output"
                        );
                        return Ok(Self::outcome(
                            session_id,
                            extraction,
                            outcome.status,
                            attempts,
                            totals,
                        ));
                    }
                    warn!(
                        attempt,
                        status = outcome.status.as_str(),
                        "Run output held no JSON object"
                    );
                    last = Some((extraction, outcome.status));
                }
                Err(e @ RunError::Model { .. }) => {
                    warn!(attempt, error = %e, "Run failed at the model");
                    model_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match (last, model_error) {
            (Some((extraction, status)), _) => {
                warn!(%session_id, attempts, "Falling back to the output template");
                Ok(Self::outcome(session_id, extraction, status, attempts, totals))
            }
            (None, Some(e)) => Err(e.into()),
            (None, None) => Err(AnalysisError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            )),
        }
    }

    fn outcome(
        session_id: Uuid,
        extraction: Extraction,
        status: RunStatus,
        attempts: usize,
        totals: Totals,
    ) -> AnalysisOutcome {
        AnalysisOutcome {
            session_id,
            output: extraction.value,
            source: extraction.source,
            filled_fields: extraction.filled_fields,
            report: extraction.report,
            attempts,
            status,
            iterations: totals.iterations,
            usage: totals.usage,
            tool_executions: totals.tool_executions,
            cache_hits: totals.cache_hits,
        }
    }
}

#[async_trait]
impl Agent for FinancialAgent {
    async fn process(&self, input: String, context: &mut Context) -> finova_core::Result<String> {
        let payload: Value = serde_json::from_str(&input)?;
        let request = AnalysisRequest::from_value(payload)?;
        let outcome = self.analyze(&request, &CancellationToken::new()).await?;

        context.insert("session_id", json!(outcome.session_id.to_string()));
        context.insert("extraction_source", json!(outcome.source.as_str()));
        context.insert("run_status", json!(outcome.status.as_str()));
        context.insert("attempts", json!(outcome.attempts));

        Ok(serde_json::to_string(&outcome.output)?)
    }

    fn name(&self) -> &str {
        "financial-analyst"
    }
}

/// Builder for [`FinancialAgent`]
#[derive(Default)]
pub struct FinancialAgentBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    config: Option<AnalysisConfig>,
    historical: Option<Arc<dyn HistoricalDataSource>>,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl FinancialAgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Source for `get_historical_data`; empty when unset
    pub fn historical_source(mut self, source: Arc<dyn HistoricalDataSource>) -> Self {
        self.historical = Some(source);
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<FinancialAgent> {
        let provider = self
            .provider
            .ok_or_else(|| AnalysisError::ConfigError("LLM provider is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let calculator = AdvancedCalculator::with_model(Arc::clone(&provider), config.model.clone())
            .with_retry(config.retry_policy());
        let historical: Arc<dyn HistoricalDataSource> = match self.historical {
            Some(source) => source,
            None => Arc::new(InMemoryHistoricalSource::new()),
        };
        let registry = Arc::new(financial_toolbox(calculator, historical)?);

        let mut executor = ReActExecutor::new(provider, registry, config.executor_config());
        if let Some(handler) = self.event_handler {
            executor = executor.with_event_handler(handler);
        }

        Ok(FinancialAgent {
            executor,
            template: financial_template()?,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finova_llm::LLMError;
    use finova_llm::providers::ScriptedProvider;

    const ANSWER: &str = r#"Thought: I now know the final answer
Final Answer: {"companyInfo": {"companyName": "Kofi Stores", "units": "GHS", "period": "March 2024"},
"incomeStatement": [{"lineItem": "Revenue", "March 2024": 500}]}"#;

    fn request() -> AnalysisRequest {
        AnalysisRequest::from_value(json!({
            "business_info": {"name": "Kofi Stores"},
            "sales": [{"date": "2024-03-02", "amount": 500}]
        }))
        .unwrap()
    }

    fn agent(provider: ScriptedProvider, max_iterations: usize) -> FinancialAgent {
        let config = AnalysisConfig::builder()
            .max_iterations(max_iterations)
            .retry_backoff_base(std::time::Duration::from_millis(1))
            .build()
            .unwrap();
        FinancialAgent::builder()
            .provider(Arc::new(provider))
            .config(config)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = FinancialAgent::builder().build().err().unwrap();
        assert_eq!(err.error_type(), "configuration_error");
    }

    #[tokio::test]
    async fn test_first_parsed_answer_wins() {
        let provider = ScriptedProvider::new([
            "Thought: add the sales\nAction: calculate_total\nAction Input: [500]",
            ANSWER,
        ]);
        let outcome = agent(provider, 5)
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.source, ExtractionSource::Direct);
        assert_eq!(outcome.tool_executions, 1);
        assert_eq!(outcome.output["incomeStatement"][0]["March 2024"], json!(500));
        assert!(outcome.filled_fields.contains(&"dupontAnalysis".to_string()));
    }

    #[tokio::test]
    async fn test_prose_answers_fall_back_to_template() {
        let provider = ScriptedProvider::repeating("Final Answer: the figures look fine");
        let outcome = agent(provider, 5)
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.source, ExtractionSource::Template);
        assert_eq!(outcome.output["companyInfo"]["companyName"], json!("Kofi Stores"));
    }

    #[tokio::test]
    async fn test_model_failures_surface() {
        let provider = ScriptedProvider::new(Vec::<String>::new())
            .then_error(LLMError::AuthenticationFailed);
        let err = agent(provider, 5)
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.error_type(), "model_error");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent(ScriptedProvider::repeating(ANSWER), 5)
            .analyze(&request(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[tokio::test]
    async fn test_agent_trait() {
        let agent = agent(ScriptedProvider::repeating(ANSWER), 5);
        let mut context = Context::new();
        let input = request().to_value().to_string();

        let output = agent.process(input, &mut context).await.unwrap();
        let output: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(agent.name(), "financial-analyst");
        assert_eq!(output["companyInfo"]["period"], json!("March 2024"));
        assert_eq!(context.get("run_status"), Some(&json!("completed")));

        let err = agent
            .process("[1, 2]".to_string(), &mut context)
            .await
            .unwrap_err();
        assert!(matches!(err, finova_core::Error::InvalidInput(_)));
    }
}
