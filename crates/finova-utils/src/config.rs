//! Environment-driven service settings
//!
//! Every field has a default so the service starts with only an API key
//! configured. Values are read from the process environment, optionally
//! seeded from a `.env` file.

use crate::LogFormat;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but could not be parsed
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    /// A combination of values is not usable
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Service settings
#[derive(Clone)]
pub struct Settings {
    /// Name reported by the root endpoint
    pub project_title: String,
    /// Prefix of the versioned API routes
    pub api_prefix: String,
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Log output format
    pub log_format: LogFormat,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// API key of the OpenAI-compatible endpoint
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint
    pub openai_api_base: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Max tokens per completion
    pub max_tokens: usize,
    /// HTTP timeout of a single completion call
    pub llm_timeout: Duration,
    /// Client-side request quota, per minute
    pub llm_requests_per_minute: Option<u32>,

    /// Reasoning cycles per agent run
    pub max_iterations: usize,
    /// Format corrections tolerated per agent run
    pub max_corrections: usize,
    /// Agent runs per analysis before extraction of last resort
    pub max_attempts: usize,
    /// Wall-clock budget of one agent run
    pub time_budget: Duration,
    /// Token budget of one agent run
    pub token_budget: Option<usize>,
    /// Upper bound on one HTTP analysis request
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_title: "Finova Backend".to_string(),
            api_prefix: "/api/v1".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            openai_api_key: None,
            openai_api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            llm_timeout: Duration::from_secs(120),
            llm_requests_per_minute: None,
            max_iterations: 15,
            max_corrections: 3,
            max_attempts: 3,
            time_budget: Duration::from_secs(180),
            token_budget: None,
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("project_title", &self.project_title)
            .field("api_prefix", &self.api_prefix)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("openai_api_base", &self.openai_api_base)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("max_attempts", &self.max_attempts)
            .field("time_budget", &self.time_budget)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load settings from the process environment
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let settings = Self {
            project_title: var("FINOVA_PROJECT_TITLE").unwrap_or(defaults.project_title),
            api_prefix: var("FINOVA_API_PREFIX").unwrap_or(defaults.api_prefix),
            host: var("FINOVA_HOST").unwrap_or(defaults.host),
            port: parse(&var, "FINOVA_PORT", defaults.port)?,
            log_format: parse(&var, "FINOVA_LOG_FORMAT", defaults.log_format)?,
            log_level: var("FINOVA_LOG_LEVEL").unwrap_or(defaults.log_level),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_api_base: var("OPENAI_API_BASE").unwrap_or(defaults.openai_api_base),
            model: var("FINOVA_MODEL").unwrap_or(defaults.model),
            temperature: parse(&var, "FINOVA_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse(&var, "FINOVA_MAX_TOKENS", defaults.max_tokens)?,
            llm_timeout: Duration::from_secs(parse(
                &var,
                "FINOVA_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            llm_requests_per_minute: parse_optional(&var, "FINOVA_LLM_REQUESTS_PER_MINUTE")?,
            max_iterations: parse(&var, "FINOVA_MAX_ITERATIONS", defaults.max_iterations)?,
            max_corrections: parse(&var, "FINOVA_MAX_CORRECTIONS", defaults.max_corrections)?,
            max_attempts: parse(&var, "FINOVA_MAX_ATTEMPTS", defaults.max_attempts)?,
            time_budget: Duration::from_secs(parse(
                &var,
                "FINOVA_TIME_BUDGET_SECS",
                defaults.time_budget.as_secs(),
            )?),
            token_budget: parse_optional(&var, "FINOVA_TOKEN_BUDGET")?,
            request_timeout: Duration::from_secs(parse(
                &var,
                "FINOVA_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.time_budget.is_zero() {
            return Err(ConfigError::Validation(
                "time budget must be non-zero".to_string(),
            ));
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "api_prefix '{}' must start with '/'",
                self.api_prefix
            )));
        }
        if self.api_prefix.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "api_prefix '{}' must name a path below the root without a trailing '/'",
                self.api_prefix
            )));
        }
        Ok(())
    }

    /// `host:port` string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_optional<T, F>(var: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("FINOVA_PORT", "9090"),
            ("FINOVA_LOG_FORMAT", "json"),
            ("OPENAI_API_KEY", "sk-test"),
            ("FINOVA_MAX_ITERATIONS", "4"),
            ("FINOVA_TOKEN_BUDGET", "20000"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 9090);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.max_iterations, 4);
        assert_eq!(settings.token_budget, Some(20_000));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[("FINOVA_MODEL", "  ")])).unwrap();
        assert_eq!(settings.model, "gpt-4o");
    }

    #[test]
    fn test_invalid_number() {
        let err = Settings::from_lookup(lookup(&[("FINOVA_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "FINOVA_PORT"));
    }

    #[test]
    fn test_validation() {
        let err = Settings::from_lookup(lookup(&[("FINOVA_MAX_ATTEMPTS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = Settings::from_lookup(lookup(&[("FINOVA_API_PREFIX", "api")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_root_and_trailing_slash_prefix_rejected() {
        for prefix in ["/", "/api/v1/"] {
            let err = Settings::from_lookup(lookup(&[("FINOVA_API_PREFIX", prefix)])).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{prefix}");
        }
        let settings = Settings::from_lookup(lookup(&[("FINOVA_API_PREFIX", "/v2")])).unwrap();
        assert_eq!(settings.api_prefix, "/v2");
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = Settings {
            openai_api_key: Some("sk-secret".to_string()),
            ..Settings::default()
        };
        let printed = format!("{settings:?}");
        assert!(!printed.contains("sk-secret"));
    }
}
