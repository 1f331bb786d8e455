//! The Doctor's LLM tier: a single chat-completion-style request to a
//! collaborator gateway, used when no pattern matched.
//!
//! A `reqwest::Client` built once with a fixed timeout, POSTing a JSON body,
//! mapping non-2xx and transport errors into the crate error type.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use supervisor_common::{Diagnosis, DoctorConfig, FailureKind, RemediationKind};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a failure-diagnosis assistant for an LLM provider supervisor. \
Given the tail of a process's logs, respond with strict JSON only, no prose, of the shape: \
{\"failure_type\": string, \"root_cause\": string, \"confidence\": number between 0 and 1, \
\"remediation\": string, \"remediation_args\": object}. \
Valid failure_type values: permission_prompt, auth_error, context_exceeded, rate_limit, \
network_error, process_crash, unknown. Valid remediation values: stdin_inject, \
restart_with_flags, fallback_provider, simple_retry, abort.";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct LlmDiagnosis {
    failure_type: String,
    root_cause: String,
    confidence: f32,
    remediation: String,
    #[serde(default)]
    remediation_args: std::collections::HashMap<String, String>,
}

/// Thin client over a single gateway endpoint, bounded by `timeout_ms`.
pub struct DoctorGatewayClient {
    client: Client,
    config: DoctorConfig,
}

impl DoctorGatewayClient {
    pub fn new(config: DoctorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Issues one classification request. Per the component contract, any
    /// timeout, transport error, non-200 status, parse failure, or empty
    /// `choices` list is not an error to the caller — it resolves to the
    /// unknown-diagnosis fallback.
    pub async fn classify(&self, log_excerpt: &str) -> Diagnosis {
        match tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            self.do_classify(log_excerpt),
        )
        .await
        {
            Ok(Some(diagnosis)) => diagnosis,
            Ok(None) => Diagnosis::unknown(),
            Err(_) => {
                debug!("doctor LLM tier timed out, falling back to unknown diagnosis");
                Diagnosis::unknown()
            }
        }
    }

    async fn do_classify(&self, log_excerpt: &str) -> Option<Diagnosis> {
        let url = format!("{}/v1/chat/completions", self.config.gateway_base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": log_excerpt},
            ],
        });

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "doctor gateway request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "doctor gateway returned non-2xx");
            return None;
        }

        let parsed: ChatCompletionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "doctor gateway response parse failure");
                return None;
            }
        };

        let content = parsed.choices.first()?.message.content.as_str();
        let json_text = extract_json(content)?;
        let llm: LlmDiagnosis = serde_json::from_str(json_text).ok()?;

        Some(Diagnosis {
            failure_kind: FailureKind::parse_lenient(&llm.failure_type),
            root_cause: llm.root_cause,
            confidence: llm.confidence.clamp(0.0, 1.0),
            remediation: RemediationKind::parse_lenient(&llm.remediation),
            remediation_args: llm.remediation_args,
            raw_analysis: Some(content.to_string()),
        })
    }
}

/// Extracts the substring from the first `{` to the last `}`, tolerating
/// surrounding prose. Returns `None` if either brace is missing.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_surrounding_prose() {
        let text = "here you go: {\"a\": 1} thanks!";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn extract_json_none_without_braces() {
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn gateway_error_falls_back_to_unknown() {
        let config = DoctorConfig {
            model: "test-model".to_string(),
            timeout_ms: 200,
            gateway_base_url: "http://127.0.0.1:9".to_string(),
        };
        let client = DoctorGatewayClient::new(config);
        let diagnosis = client.classify("some log content").await;
        assert_eq!(diagnosis.failure_kind, FailureKind::Unknown);
        assert_eq!(diagnosis.remediation, RemediationKind::Abort);
        assert_eq!(diagnosis.confidence, 0.0);
    }

    #[tokio::test]
    async fn mock_gateway_returns_parsed_diagnosis() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "content": "here is my analysis: {\"failure_type\": \"RATE_LIMIT\", \"root_cause\": \"too many requests\", \"confidence\": 0.7, \"remediation\": \"Retry\", \"remediation_args\": {}}"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let config = DoctorConfig {
            model: "test-model".to_string(),
            timeout_ms: 2_000,
            gateway_base_url: server.uri(),
        };
        let client = DoctorGatewayClient::new(config);
        let diagnosis = client.classify("HTTP 429 body").await;
        assert_eq!(diagnosis.failure_kind, FailureKind::RateLimit);
        assert_eq!(diagnosis.remediation, RemediationKind::SimpleRetry);
        assert_eq!(diagnosis.confidence, 0.7);
    }
}
