//! Shared application state

use anyhow::Context as _;
use finova_analysis::{AnalysisConfig, FinancialAgent};
use finova_llm::providers::{OpenAIConfig, OpenAIProvider};
use finova_utils::Settings;
use std::sync::Arc;
use std::time::Duration;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<FinancialAgent>,
    pub project_title: String,
    pub api_prefix: String,
    /// Upper bound on one analysis request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(agent: FinancialAgent, settings: &Settings) -> Self {
        Self {
            agent: Arc::new(agent),
            project_title: settings.project_title.clone(),
            api_prefix: settings.api_prefix.clone(),
            request_timeout: settings.request_timeout,
        }
    }

    /// Wire the OpenAI-compatible provider and the agent from settings
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY must be set")?;

        let mut llm_config = OpenAIConfig::new(api_key)
            .with_api_base(settings.openai_api_base.clone())
            .with_timeout(settings.llm_timeout.as_secs());
        if let Some(rpm) = settings.llm_requests_per_minute {
            llm_config = llm_config.with_requests_per_minute(rpm);
        }
        let provider = OpenAIProvider::with_config(llm_config)?;

        let agent = FinancialAgent::builder()
            .provider(Arc::new(provider))
            .config(analysis_config(settings)?)
            .build()?;

        Ok(Self::new(agent, settings))
    }
}

/// Analysis settings taken from the service settings
pub fn analysis_config(settings: &Settings) -> anyhow::Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .model(settings.model.clone())
        .temperature(settings.temperature)
        .max_tokens(settings.max_tokens)
        .max_iterations(settings.max_iterations)
        .max_corrections(settings.max_corrections)
        .max_attempts(settings.max_attempts)
        .time_budget(Some(settings.time_budget));
    if let Some(budget) = settings.token_budget {
        builder = builder.token_budget(budget);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_config_follows_settings() {
        let settings = Settings::from_lookup(|key| match key {
            "FINOVA_MODEL" => Some("gpt-4o-mini".to_string()),
            "FINOVA_MAX_ATTEMPTS" => Some("2".to_string()),
            "FINOVA_TOKEN_BUDGET" => Some("50000".to_string()),
            _ => None,
        })
        .unwrap();
        let config = analysis_config(&settings).unwrap();

        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.token_budget, Some(50000));
        assert_eq!(config.time_budget, Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let err = AppState::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
