//! Static model context-window table, plus the collaborator contract for
//! the global model registry used to recommend a larger-context model.

const DEFAULT_LIMIT: u64 = 8192;

const STATIC_LIMITS: &[(&str, u64)] = &[
    ("gpt-4", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-turbo", 128000),
    ("gpt-4o", 128000),
    ("gpt-3.5-turbo", 16385),
    ("claude-3-opus", 200000),
    ("claude-3-sonnet", 200000),
    ("claude-3-haiku", 200000),
    ("claude-3-5-sonnet", 200000),
    ("gemini-pro", 32760),
    ("gemini-1.5-pro", 1000000),
    ("gemini-1.5-flash", 1000000),
    ("gemini-flash", 1000000),
];

/// Exact match against the static table; failing that, the longest entry
/// whose name is a prefix of `model`; failing that, 8192.
pub fn model_context_limit(model: &str) -> u64 {
    if let Some((_, limit)) = STATIC_LIMITS.iter().find(|(name, _)| *name == model) {
        return *limit;
    }
    STATIC_LIMITS
        .iter()
        .filter(|(name, _)| model.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_LIMIT)
}

/// One entry from the collaborator-supplied global model registry.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub context_length: u64,
    pub provider: String,
}

/// The model registry is an external collaborator (see crate docs); the
/// Sculptor only needs to enumerate candidates when recommending a
/// larger-context model for unreducible content.
pub trait ModelRegistry: Send + Sync {
    fn models(&self) -> Vec<ModelInfo>;
}

/// Registry models whose `context_length >= required`, sorted ascending
/// (smallest sufficient model first), top three.
pub fn recommend_models(registry: &dyn ModelRegistry, required: u64) -> Vec<ModelInfo> {
    let mut candidates: Vec<ModelInfo> = registry
        .models()
        .into_iter()
        .filter(|m| m.context_length >= required)
        .collect();
    candidates.sort_by_key(|m| m.context_length);
    candidates.truncate(3);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_falls_back_to_default() {
        assert_eq!(model_context_limit("some-unheard-of-model"), DEFAULT_LIMIT);
    }

    #[test]
    fn exact_match_wins_over_prefix() {
        assert_eq!(model_context_limit("gpt-4"), 8192);
        assert_eq!(model_context_limit("gpt-4-32k"), 32768);
    }

    #[test]
    fn longest_prefix_match_used_for_variants() {
        assert_eq!(model_context_limit("gpt-4-turbo-preview"), 128000);
    }

    struct FakeRegistry(Vec<ModelInfo>);
    impl ModelRegistry for FakeRegistry {
        fn models(&self) -> Vec<ModelInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn recommend_models_sorted_ascending_top_three() {
        let registry = FakeRegistry(vec![
            ModelInfo { id: "big".to_string(), context_length: 1_000_000, provider: "g".to_string() },
            ModelInfo { id: "small".to_string(), context_length: 9000, provider: "g".to_string() },
            ModelInfo { id: "too-small".to_string(), context_length: 4000, provider: "g".to_string() },
            ModelInfo { id: "mid".to_string(), context_length: 32000, provider: "g".to_string() },
        ]);
        let recommended = recommend_models(&registry, 8192);
        assert_eq!(
            recommended.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["small", "mid", "big"]
        );
    }
}
