//! Error types for financial analysis operations

use finova_runtime::RunError;
use thiserror::Error;

/// Financial analysis specific errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The payload cannot be analysed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every agent attempt failed at the model
    #[error("Model error: {0}")]
    Model(String),

    /// The caller abandoned the analysis
    #[error("Analysis cancelled")]
    Cancelled,

    /// The prompt could not be rendered
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl AnalysisError {
    /// Machine-readable error kind carried in error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Model(_) => "model_error",
            Self::Cancelled => "cancelled",
            Self::Prompt(_) => "prompt_error",
            Self::ConfigError(_) => "configuration_error",
            Self::JsonError(_) => "json_error",
            Self::Other(_) => "analysis_error",
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Convert AnalysisError to finova_core::Error
impl From<AnalysisError> for finova_core::Error {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidRequest(msg) => finova_core::Error::InvalidInput(msg),
            AnalysisError::Cancelled => finova_core::Error::Cancelled,
            AnalysisError::ConfigError(msg) => finova_core::Error::InitializationFailed(msg),
            other => finova_core::Error::ProcessingFailed(other.to_string()),
        }
    }
}

/// Convert finova_core::Error to AnalysisError
impl From<finova_core::Error> for AnalysisError {
    fn from(err: finova_core::Error) -> Self {
        match err {
            finova_core::Error::InvalidInput(msg) => AnalysisError::InvalidRequest(msg),
            finova_core::Error::Cancelled => AnalysisError::Cancelled,
            finova_core::Error::InitializationFailed(msg) => AnalysisError::ConfigError(msg),
            other => AnalysisError::Other(other.to_string()),
        }
    }
}

impl From<RunError> for AnalysisError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Cancelled => AnalysisError::Cancelled,
            RunError::Model { .. } => AnalysisError::Model(err.to_string()),
            RunError::Prompt(inner) => AnalysisError::Prompt(inner.to_string()),
        }
    }
}

impl From<finova_prompt::PromptError> for AnalysisError {
    fn from(err: finova_prompt::PromptError) -> Self {
        AnalysisError::Prompt(err.to_string())
    }
}
