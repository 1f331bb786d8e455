//! Response enrichment: the `superbrain` extension inserted into a
//! successful payload, and the `NegotiatedFailureResponse` returned when
//! nothing recovers the request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use supervisor_common::HealingMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingActionSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Superbrain {
    pub healed: bool,
    pub original_provider: String,
    pub final_provider: String,
    pub healing_actions: Vec<HealingActionSummary>,
    pub context_optimized: bool,
}

impl Superbrain {
    pub fn from_metadata(metadata: &HealingMetadata) -> Self {
        Self {
            healed: !metadata.actions.is_empty(),
            original_provider: metadata.original_provider.clone(),
            final_provider: metadata.final_provider.clone(),
            healing_actions: metadata
                .actions
                .iter()
                .map(|a| HealingActionSummary {
                    kind: a.kind.as_str().to_string(),
                    description: a.description.clone(),
                    success: a.success,
                })
                .collect(),
            context_optimized: metadata.context_optimized,
        }
    }
}

/// Inserts a top-level `superbrain` key into `payload` if it's a JSON
/// object and at least one healing action was recorded; otherwise the
/// payload round-trips untouched (a no-op request must not gain a key).
pub fn enrich_payload(mut payload: Value, metadata: &HealingMetadata) -> Value {
    if metadata.actions.is_empty() {
        return payload;
    }
    let superbrain = serde_json::to_value(Superbrain::from_metadata(metadata)).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut payload {
        map.insert("superbrain".to_string(), superbrain);
        payload
    } else {
        payload
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSuperbrain {
    pub attempted_actions: Vec<String>,
    pub diagnosis_summary: String,
    pub suggestions: Vec<String>,
    pub fallbacks_tried: Vec<String>,
}

/// The payload returned when every remediation path is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatedFailureResponse {
    pub error: ErrorDetail,
    pub superbrain: FailureSuperbrain,
}

impl NegotiatedFailureResponse {
    pub fn new(
        message: impl Into<String>,
        kind: impl Into<String>,
        code: impl Into<String>,
        metadata: &HealingMetadata,
        suggestions: Vec<String>,
        fallbacks_tried: Vec<String>,
    ) -> Self {
        let attempted_actions = metadata.actions.iter().map(|a| a.kind.as_str().to_string()).collect();
        let diagnosis_summary = metadata
            .diagnoses
            .last()
            .map(|d| d.root_cause.clone())
            .unwrap_or_else(|| "no diagnosis was performed".to_string());

        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: kind.into(),
                code: code.into(),
            },
            superbrain: FailureSuperbrain {
                attempted_actions,
                diagnosis_summary,
                suggestions,
                fallbacks_tried,
            },
        }
    }
}

/// Flattens a JSON payload into the plain-text body a Sculptor pass or
/// Doctor pattern match scans for file references / error phrases.
pub fn payload_as_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => flatten_object(map),
        other => other.to_string(),
    }
}

fn flatten_object(map: &Map<String, Value>) -> String {
    map.values()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervisor_common::{HealingAction, HealingActionKind};
    use uuid::Uuid;

    #[test]
    fn enrich_inserts_superbrain_into_object_payload() {
        let mut metadata = HealingMetadata::new(Uuid::new_v4(), "claudecli");
        metadata.actions.push(HealingAction::new(HealingActionKind::SimpleRetry, "retried", true));

        let payload = serde_json::json!({"text": "hello"});
        let enriched = enrich_payload(payload, &metadata);
        assert!(enriched.get("superbrain").is_some());
        assert_eq!(enriched["superbrain"]["healed"], serde_json::json!(true));
    }

    #[test]
    fn enrich_leaves_payload_untouched_when_no_actions_recorded() {
        let metadata = HealingMetadata::new(Uuid::new_v4(), "claudecli");
        let payload = serde_json::json!({"text": "hello"});
        let enriched = enrich_payload(payload.clone(), &metadata);
        assert_eq!(enriched, payload);
        assert!(enriched.get("superbrain").is_none());
    }

    #[test]
    fn enrich_leaves_non_object_payload_untouched() {
        let metadata = HealingMetadata::new(Uuid::new_v4(), "claudecli");
        let payload = serde_json::json!(["a", "b"]);
        let enriched = enrich_payload(payload.clone(), &metadata);
        assert_eq!(enriched, payload);
    }
}
