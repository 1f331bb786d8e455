//! Request adaptation for a newly chosen fallback provider: preserve
//! semantics, rewrite the model id, strip provider-incompatible extras.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use supervisor_common::ProviderCapability;

/// Minimal chat-completion-shaped request the Router knows how to adapt.
/// Unknown top-level fields round-trip unchanged via `other`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "max_tokens")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "top_p")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn map_model(model: &str, target_provider: &str) -> String {
    let mapping: &[((&str, &str), &str)] = &[
        (("gpt-4", "claudecli"), "claude-3-opus"),
        (("gpt-4", "geminicli"), "gemini-1.5-pro"),
        (("claude-3-opus", "codexcli"), "gpt-4-turbo"),
        (("claude-3-opus", "geminicli"), "gemini-1.5-pro"),
        (("claude-3-sonnet", "geminicli"), "gemini-1.5-flash"),
        (("gemini-1.5-pro", "claudecli"), "claude-3-opus"),
        (("gemini-1.5-pro", "codexcli"), "gpt-4-turbo"),
    ];
    mapping
        .iter()
        .find(|((src, dst), _)| *src == model && *dst == target_provider)
        .map(|(_, mapped)| mapped.to_string())
        .unwrap_or_else(|| default_model_for(target_provider).to_string())
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "claudecli" => "claude-3-sonnet",
        "geminicli" => "gemini-1.5-flash",
        "codexcli" => "gpt-4-turbo",
        _ => "gpt-3.5-turbo",
    }
}

/// Adapts `payload` for `target`: preserves messages (order + role), the
/// stream flag, temperature, max-tokens, top-p and stop verbatim; rewrites
/// the model id; strips `extra_body.cli` when the target doesn't support
/// CLI adapters. Returns the adapted payload and the list of fields
/// preserved unchanged, for the audit trail.
pub fn adapt_request(mut payload: RequestPayload, target: &ProviderCapability) -> (RequestPayload, Vec<String>) {
    let mut preserved = vec!["messages".to_string(), "stream".to_string()];
    if payload.temperature.is_some() {
        preserved.push("temperature".to_string());
    }
    if payload.max_tokens.is_some() {
        preserved.push("max_tokens".to_string());
    }
    if payload.top_p.is_some() {
        preserved.push("top_p".to_string());
    }
    if payload.stop.is_some() {
        preserved.push("stop".to_string());
    }

    payload.model = map_model(&payload.model, &target.provider_id);

    if !target.supports_cli {
        if let Some(extra_body) = payload.extra_body.as_mut() {
            extra_body.remove("cli");
            if extra_body.is_empty() {
                payload.extra_body = None;
            }
        }
    }

    (payload, preserved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(provider_id: &str, supports_cli: bool) -> ProviderCapability {
        ProviderCapability {
            provider_id: provider_id.to_string(),
            max_context_size: 100_000,
            supports_stream: true,
            supports_cli,
            default_success_rate: 0.9,
            average_latency_ms: 500,
            is_available: true,
        }
    }

    #[test]
    fn preserves_core_fields_and_rewrites_model() {
        let payload = RequestPayload {
            model: "gpt-4".to_string(),
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            stream: true,
            temperature: Some(0.7),
            max_tokens: Some(500),
            top_p: Some(0.9),
            stop: Some(serde_json::json!(["\n"])),
            extra_body: None,
            other: Default::default(),
        };
        let target = capability("claudecli", true);
        let (adapted, preserved) = adapt_request(payload.clone(), &target);
        assert_eq!(adapted.messages, payload.messages);
        assert_eq!(adapted.stream, payload.stream);
        assert_eq!(adapted.temperature, payload.temperature);
        assert_eq!(adapted.max_tokens, payload.max_tokens);
        assert_eq!(adapted.top_p, payload.top_p);
        assert_eq!(adapted.stop, payload.stop);
        assert_eq!(adapted.model, "claude-3-opus");
        assert!(preserved.contains(&"temperature".to_string()));
    }

    #[test]
    fn strips_extra_body_cli_for_non_cli_target() {
        let mut extra_body = Map::new();
        extra_body.insert("cli".to_string(), serde_json::json!({"flags": ["--yes"]}));
        let payload = RequestPayload {
            model: "gpt-4".to_string(),
            messages: vec![],
            stream: false,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
            extra_body: Some(extra_body),
            other: Default::default(),
        };
        let target = capability("gemini-http", false);
        let (adapted, _) = adapt_request(payload, &target);
        assert!(adapted.extra_body.is_none());
    }

    #[test]
    fn unknown_model_picks_provider_default() {
        let payload = RequestPayload {
            model: "totally-unknown-model".to_string(),
            messages: vec![],
            stream: false,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
            extra_body: None,
            other: Default::default(),
        };
        let target = capability("geminicli", true);
        let (adapted, _) = adapt_request(payload, &target);
        assert_eq!(adapted.model, "gemini-1.5-flash");
    }
}
