//! A small in-memory stand-in for the collaborator-supplied global model
//! registry Sculptor queries when recommending a larger-context model.

use supervisor_sculptor::{ModelInfo, ModelRegistry};

#[derive(Default)]
pub struct StaticModelRegistry;

impl ModelRegistry for StaticModelRegistry {
    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o".to_string(),
                context_length: 128_000,
                provider: "openai".to_string(),
            },
            ModelInfo {
                id: "claude-3-opus".to_string(),
                context_length: 200_000,
                provider: "anthropic".to_string(),
            },
            ModelInfo {
                id: "gemini-1.5-pro".to_string(),
                context_length: 1_000_000,
                provider: "google".to_string(),
            },
        ]
    }
}
