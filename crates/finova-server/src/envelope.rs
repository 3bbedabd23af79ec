//! The response envelope shared by every endpoint

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use finova_analysis::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SUCCESS: &str = "success";
pub const ERROR: &str = "error";

/// `{status, status_code, message, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub status_code: u16,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: SUCCESS.to_string(),
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data,
        }
    }

    /// Error envelope carried with the given HTTP status
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        error: impl Into<String>,
        error_type: &str,
    ) -> Self {
        Self {
            status: ERROR.to_string(),
            status_code: status.as_u16(),
            message: message.into(),
            data: json!({ "error": error.into(), "error_type": error_type }),
        }
    }

    /// Agent-level failure, reported with HTTP 200
    pub fn analysis_failure(err: &AnalysisError) -> Self {
        Self::error(
            StatusCode::OK,
            "Financial analysis failed",
            err.to_string(),
            err.error_type(),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
