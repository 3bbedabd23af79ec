//! Error types for finova-core

use thiserror::Error;

/// Result type alias for finova-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Agent initialization failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// Caller supplied input the agent cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The run was cancelled by its caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generic(_) => "generic",
            Self::InitializationFailed(_) => "initialization_failed",
            Self::ProcessingFailed(_) => "processing_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Cancelled.kind(), "cancelled");
        assert_eq!(
            Error::ProcessingFailed("x".to_string()).kind(),
            "processing_failed"
        );
    }

    #[test]
    fn test_json_error_is_invalid_input() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
