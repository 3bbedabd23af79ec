//! Configuration for financial analysis runs

use crate::error::{AnalysisError, Result};
use finova_runtime::{ExecutorConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one analysis (all agent attempts of a request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Model calls per agent run
    pub max_iterations: usize,

    /// Format corrections tolerated per agent run
    pub max_corrections: usize,

    /// Agent runs before extraction of last resort
    pub max_attempts: usize,

    /// Wall-clock budget of one agent run
    pub time_budget: Option<Duration>,

    /// Token budget of one agent run
    pub token_budget: Option<usize>,

    /// Consecutive transient model failures tolerated
    pub model_retries: u32,

    /// Initial backoff after a transient model failure
    pub retry_backoff_base: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            max_iterations: 15,
            max_corrections: 3,
            max_attempts: 3,
            time_budget: Some(Duration::from_secs(180)),
            token_budget: None,
            model_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AnalysisError::ConfigError(
                "model must not be empty".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::ConfigError(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(AnalysisError::ConfigError(
                "max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.model_retries == 0 {
            return Err(AnalysisError::ConfigError(
                "model_retries must be greater than 0".to_string(),
            ));
        }
        if self.time_budget.is_some_and(|b| b.is_zero()) {
            return Err(AnalysisError::ConfigError(
                "time_budget must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy for transient model failures
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.model_retries,
            initial_backoff: self.retry_backoff_base,
            ..RetryPolicy::default()
        }
    }

    /// Executor settings for one agent run
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_iterations: self.max_iterations,
            max_corrections: self.max_corrections,
            time_budget: self.time_budget,
            token_budget: self.token_budget,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            retry: self.retry_policy(),
            ..ExecutorConfig::default()
        }
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    max_iterations: Option<usize>,
    max_corrections: Option<usize>,
    max_attempts: Option<usize>,
    time_budget: Option<Option<Duration>>,
    token_budget: Option<usize>,
    model_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
}

impl AnalysisConfigBuilder {
    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens per completion
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set model calls per run
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Set format corrections per run
    pub fn max_corrections(mut self, max: usize) -> Self {
        self.max_corrections = Some(max);
        self
    }

    /// Set agent runs per analysis
    pub fn max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Set the wall-clock budget per run; `None` disables it
    pub fn time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Set the token budget per run
    pub fn token_budget(mut self, budget: usize) -> Self {
        self.token_budget = Some(budget);
        self
    }

    /// Set consecutive transient failures tolerated
    pub fn model_retries(mut self, retries: u32) -> Self {
        self.model_retries = Some(retries);
        self
    }

    /// Set the initial retry backoff
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_corrections: self.max_corrections.unwrap_or(defaults.max_corrections),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            time_budget: self.time_budget.unwrap_or(defaults.time_budget),
            token_budget: self.token_budget.or(defaults.token_budget),
            model_retries: self.model_retries.unwrap_or(defaults.model_retries),
            retry_backoff_base: self
                .retry_backoff_base
                .unwrap_or(defaults.retry_backoff_base),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_iterations, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalysisConfig::builder()
            .model("gpt-4o-mini")
            .max_iterations(6)
            .time_budget(None)
            .token_budget(50_000)
            .build()
            .unwrap();

        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.time_budget, None);
        assert_eq!(config.token_budget, Some(50_000));
    }

    #[test]
    fn test_validation() {
        assert!(AnalysisConfig::builder().max_attempts(0).build().is_err());
        assert!(AnalysisConfig::builder().model(" ").build().is_err());
        assert!(
            AnalysisConfig::builder()
                .time_budget(Some(Duration::ZERO))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_executor_config() {
        let config = AnalysisConfig::builder()
            .max_corrections(5)
            .model_retries(2)
            .build()
            .unwrap();
        let executor = config.executor_config();

        assert_eq!(executor.max_corrections, 5);
        assert_eq!(executor.retry.max_attempts, 2);
        assert_eq!(executor.temperature, Some(0.0));
        assert_eq!(executor.stop_sequences, vec!["\nObservation:".to_string()]);
    }
}
