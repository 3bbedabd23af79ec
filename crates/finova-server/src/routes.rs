//! Request handlers

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use finova_analysis::AnalysisRequest;
use finova_core::Context;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn root(State(state): State<AppState>) -> Envelope {
    Envelope::success(format!("Welcome to {}", state.project_title), json!({}))
}

pub async fn probe() -> Envelope {
    Envelope::success("I am the Finova API responding", json!({}))
}

pub async fn health() -> Envelope {
    Envelope::success("Health check successful", json!({ "status": "healthy" }))
}

/// `POST {api_prefix}/analyze`
///
/// Any JSON object is accepted. Agent-level failures are reported inside a
/// 200 envelope; only non-object bodies are rejected with 400.
pub async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Envelope {
    let context = request_context(&headers);
    info!(
        request_id = context.request_id(),
        user_id = context.user_id(),
        "Analysis request received"
    );

    let request = match AnalysisRequest::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(request_id = context.request_id(), error = %e, "Rejected analysis payload");
            return Envelope::error(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                e.to_string(),
                e.error_type(),
            );
        }
    };

    // cancelled when the handler future is dropped
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = tokio::time::timeout(
        state.request_timeout,
        state.agent.analyze(&request, &cancel),
    )
    .await;

    match result {
        Ok(Ok(outcome)) => {
            info!(
                request_id = context.request_id(),
                session_id = %outcome.session_id,
                source = outcome.source.as_str(),
                status = outcome.status.as_str(),
                attempts = outcome.attempts,
                "Analysis completed"
            );
            Envelope::success("Financial analysis completed successfully", outcome.output)
        }
        Ok(Err(e)) => {
            warn!(request_id = context.request_id(), error = %e, "Analysis failed");
            Envelope::analysis_failure(&e)
        }
        Err(_) => {
            cancel.cancel();
            warn!(
                request_id = context.request_id(),
                timeout_secs = state.request_timeout.as_secs(),
                "Analysis timed out"
            );
            Envelope::error(
                StatusCode::OK,
                "Financial analysis failed",
                format!(
                    "analysis exceeded {}s",
                    state.request_timeout.as_secs()
                ),
                "timeout",
            )
        }
    }
}

fn request_context(headers: &HeaderMap) -> Context {
    let context = Context::new().with_request_id(Uuid::new_v4().to_string());
    match headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
    {
        Some(user) => context.with_user_id(user),
        None => context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use finova_analysis::{AnalysisConfig, FinancialAgent};
    use finova_llm::LLMError;
    use finova_llm::providers::ScriptedProvider;
    use finova_utils::Settings;
    use std::sync::Arc;

    const ANSWER: &str = r#"Thought: I now know the final answer
Final Answer: {"companyInfo": {"companyName": "Esi Bakery", "units": "GHS", "period": "May 2024"}}"#;

    fn state(provider: ScriptedProvider) -> AppState {
        let config = AnalysisConfig::builder()
            .max_iterations(3)
            .max_attempts(1)
            .build()
            .unwrap();
        let agent = FinancialAgent::builder()
            .provider(Arc::new(provider))
            .config(config)
            .build()
            .unwrap();
        AppState::new(agent, &Settings::default())
    }

    #[tokio::test]
    async fn test_health() {
        let envelope = health().await;
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.data, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_root_names_project() {
        let envelope = root(State(state(ScriptedProvider::repeating(ANSWER)))).await;
        assert_eq!(envelope.message, "Welcome to Finova Backend");
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let envelope = analyze(
            State(state(ScriptedProvider::repeating(ANSWER))),
            HeaderMap::new(),
            Json(json!({"sales": [{"date": "2024-05-01", "amount": 90}]})),
        )
        .await;

        assert!(envelope.is_success());
        assert_eq!(envelope.message, "Financial analysis completed successfully");
        assert_eq!(envelope.data["companyInfo"]["companyName"], json!("Esi Bakery"));
        assert!(envelope.data.get("dupontAnalysis").is_some());
    }

    #[tokio::test]
    async fn test_analyze_rejects_non_object() {
        let envelope = analyze(
            State(state(ScriptedProvider::repeating(ANSWER))),
            HeaderMap::new(),
            Json(json!([1, 2, 3])),
        )
        .await;

        assert_eq!(envelope.status_code, 400);
        assert_eq!(envelope.data["error_type"], json!("invalid_request"));
    }

    #[tokio::test]
    async fn test_model_failure_is_enveloped() {
        let provider =
            ScriptedProvider::new(Vec::<String>::new()).then_error(LLMError::AuthenticationFailed);
        let envelope = analyze(State(state(provider)), HeaderMap::new(), Json(json!({}))).await;

        assert_eq!(envelope.status_code, 200);
        assert!(!envelope.is_success());
        assert_eq!(envelope.data["error_type"], json!("model_error"));
    }

    #[test]
    fn test_user_header_lands_on_context() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-42"));

        let context = request_context(&headers);
        assert_eq!(context.user_id(), Some("user-42"));
        assert!(context.request_id().is_some());
        assert_eq!(request_context(&HeaderMap::new()).user_id(), None);
    }
}
