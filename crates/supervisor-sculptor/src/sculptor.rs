//! Priority-scored file selection under a token budget, plus the
//! high-density map of whatever had to be dropped.
//!
//! The inverse of an LRU eviction: instead of evicting until under budget,
//! Sculptor includes highest-score-first until the budget would be
//! exceeded.

use std::collections::HashMap;

use supervisor_common::{HighDensityMap, SculptorConfig};

use crate::file_analyzer::AnalyzedFile;
use crate::model_limits::{recommend_models, ModelInfo, ModelRegistry};

const TEST_SUFFIXES: &[&str] = &["_test.go", ".test.js", ".test.ts", ".spec.js", ".spec.ts"];
const TEST_FRAGMENTS: &[&str] = &["/test/", "/tests/", "/__tests__/"];
const GENERATED_FRAGMENTS: &[&str] = &[
    "vendor/",
    "node_modules/",
    "dist/",
    "build/",
    "target/",
    ".next/",
];
const LOCK_FILES: &[&str] = &["Cargo.lock", "package-lock.json", "yarn.lock", "poetry.lock", "Gemfile.lock"];
const ENTRY_POINT_BASENAMES: &[&str] = &["main.rs", "main.go", "main.py", "index.js", "index.ts", "index.tsx"];
const CONFIG_BASENAME_PREFIXES: &[&str] = &["config."];
const CONFIG_BASENAMES: &[&str] = &["Makefile", "Dockerfile"];

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_test_file(path: &str) -> bool {
    let base = basename(path);
    TEST_SUFFIXES.iter().any(|suffix| base.ends_with(suffix))
        || base.starts_with("test_")
        || TEST_FRAGMENTS.iter().any(|fragment| path.contains(fragment))
}

fn is_generated_or_vendored(path: &str) -> bool {
    GENERATED_FRAGMENTS.iter().any(|fragment| path.contains(fragment))
        || LOCK_FILES.iter().any(|lock| basename(path) == *lock)
}

fn priority_score(file: &AnalyzedFile, config: &SculptorConfig, keywords: &[String]) -> i64 {
    let base = basename(&file.path);
    let mut score: i64 = 0;

    if config.priority_files.iter().any(|p| p.eq_ignore_ascii_case(base)) {
        score += 1000;
    } else if base.to_ascii_lowercase().starts_with("readme") {
        score += 500;
    } else if ENTRY_POINT_BASENAMES.iter().any(|p| p.eq_ignore_ascii_case(base)) {
        score += 400;
    } else if base.starts_with("docker-compose.")
        || CONFIG_BASENAME_PREFIXES.iter().any(|p| base.starts_with(p))
        || CONFIG_BASENAMES.iter().any(|p| *p == base)
    {
        score += 300;
    }

    let lower_path = file.path.to_ascii_lowercase();
    for keyword in keywords {
        let keyword_lower = keyword.to_ascii_lowercase();
        if lower_path.contains(&keyword_lower) {
            score += 200;
        }
        if let Some(content) = &file.content_excerpt {
            if content.to_ascii_lowercase().contains(&keyword_lower) {
                score += 50;
            }
        }
    }

    if file.tokens > 5_000 {
        score -= 100;
    }
    if file.tokens > 10_000 {
        score -= 200;
    }

    if is_test_file(&file.path) {
        score -= 50;
    }
    if is_generated_or_vendored(&file.path) {
        score -= 500;
    }

    score
}

fn short_summary(file: &AnalyzedFile) -> String {
    let content = file.content_excerpt.as_deref().unwrap_or_default();
    let word_count = content.split_whitespace().count();
    let lines: Vec<String> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(3)
        .map(|l| {
            let mut capped: String = l.chars().take(100).collect();
            if l.chars().count() > 100 {
                capped.push('…');
            }
            capped
        })
        .collect();
    format!("{} ({} words)", lines.join(" | "), word_count)
}

fn directory_tree(paths: &[String]) -> String {
    let mut entries: Vec<(&str, &str)> = paths
        .iter()
        .map(|p| {
            let dir = p.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            (dir, basename(p))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(b.1)));

    let mut tree = String::new();
    let mut last_dir: Option<&str> = None;
    for (dir, file) in entries {
        if last_dir != Some(dir) {
            tree.push_str(dir);
            tree.push('\n');
            last_dir = Some(dir);
        }
        tree.push_str("  ");
        tree.push_str(file);
        tree.push('\n');
    }
    tree
}

/// Successful outcome of pre-flight selection.
#[derive(Debug, Clone)]
pub struct PreFlightOutcome {
    pub can_proceed: bool,
    pub included: Vec<String>,
    pub high_density_map: Option<HighDensityMap>,
}

/// Unreducible-content terminal failure: even after dropping every
/// droppable file the remaining minimum content still exceeds the model's
/// budget.
#[derive(Debug, Clone)]
pub struct UnreducibleContentError {
    pub tokens: u64,
    pub target: u64,
    pub recommendations: Vec<ModelInfo>,
    pub message: String,
}

impl std::fmt::Display for UnreducibleContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Runs the pre-flight budget check. If the files already fit, returns
/// immediately with no optimization. Otherwise scores, sorts, and greedily
/// includes files under `limit`, producing a `HighDensityMap` of whatever
/// got excluded.
pub fn perform_pre_flight(
    files: Vec<AnalyzedFile>,
    limit: u64,
    config: &SculptorConfig,
    keywords: &[String],
    registry: &dyn ModelRegistry,
) -> Result<PreFlightOutcome, UnreducibleContentError> {
    let total_tokens: u64 = files.iter().map(|f| f.tokens).sum();
    if total_tokens <= limit {
        return Ok(PreFlightOutcome {
            can_proceed: true,
            included: files.into_iter().map(|f| f.path).collect(),
            high_density_map: None,
        });
    }

    let mut scored: Vec<(i64, AnalyzedFile)> = files
        .into_iter()
        .map(|f| (priority_score(&f, config, keywords), f))
        .collect();
    // Stable sort: ties keep input order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut included = Vec::new();
    let mut excluded = Vec::new();
    let mut cumulative: u64 = 0;
    for (_, file) in scored {
        if cumulative + file.tokens <= limit {
            cumulative += file.tokens;
            included.push(file);
        } else {
            excluded.push(file);
        }
    }

    if included.is_empty() {
        let recommendations = recommend_models(registry, total_tokens);
        return Err(UnreducibleContentError {
            tokens: total_tokens,
            target: limit,
            message: format!(
                "request requires ~{total_tokens} tokens, which exceeds the target model's {limit}-token budget \
                 even after dropping every excludable file"
            ),
            recommendations,
        });
    }

    let mut excluded_summaries = HashMap::new();
    let mut tokens_saved: u64 = 0;
    for file in &excluded {
        excluded_summaries.insert(file.path.clone(), short_summary(file));
        tokens_saved += file.tokens;
    }

    let mut all_paths: Vec<String> = included.iter().map(|f| f.path.clone()).collect();
    all_paths.extend(excluded.iter().map(|f| f.path.clone()));

    let high_density_map = HighDensityMap {
        total_files: included.len() + excluded.len(),
        included_files: included.len(),
        excluded_files: excluded.len(),
        directory_tree: directory_tree(&all_paths),
        excluded_summaries,
        tokens_saved,
    };

    Ok(PreFlightOutcome {
        can_proceed: true,
        included: included.into_iter().map(|f| f.path).collect(),
        high_density_map: Some(high_density_map),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyRegistry;
    impl ModelRegistry for EmptyRegistry {
        fn models(&self) -> Vec<ModelInfo> {
            vec![
                ModelInfo { id: "gpt-4-turbo".to_string(), context_length: 128_000, provider: "openai".to_string() },
            ]
        }
    }

    fn file(path: &str, tokens: u64) -> AnalyzedFile {
        AnalyzedFile { path: path.to_string(), tokens, content_excerpt: None }
    }

    #[test]
    fn fits_under_budget_proceeds_without_optimization() {
        let files = vec![file("a.rs", 100), file("b.rs", 200)];
        let outcome = perform_pre_flight(files, 1000, &SculptorConfig::default(), &[], &EmptyRegistry).unwrap();
        assert!(outcome.can_proceed);
        assert!(outcome.high_density_map.is_none());
        assert_eq!(outcome.included.len(), 2);
    }

    #[test]
    fn over_budget_excludes_lowest_priority_first() {
        let files = vec![
            file("README.md", 400),
            file("src/main.rs", 400),
            file("vendor/lib.rs", 400),
        ];
        let outcome = perform_pre_flight(files, 850, &SculptorConfig::default(), &[], &EmptyRegistry).unwrap();
        assert!(outcome.can_proceed);
        assert!(outcome.included.contains(&"README.md".to_string()));
        assert!(!outcome.included.contains(&"vendor/lib.rs".to_string()));
        let map = outcome.high_density_map.unwrap();
        assert_eq!(map.excluded_files, 1);
        assert!(map.excluded_summaries.contains_key("vendor/lib.rs"));
    }

    #[test]
    fn can_proceed_implies_sum_under_limit() {
        let files = vec![file("a.rs", 900), file("b.rs", 900), file("c.rs", 900)];
        let outcome = perform_pre_flight(files, 1000, &SculptorConfig::default(), &[], &EmptyRegistry).unwrap();
        let included_tokens: u64 = outcome.included.len() as u64 * 900;
        assert!(included_tokens <= 1000);
    }

    #[test]
    fn unreducible_when_even_smallest_single_file_exceeds_limit() {
        let files = vec![file("a.rs", 5000)];
        let result = perform_pre_flight(files, 1000, &SculptorConfig::default(), &[], &EmptyRegistry);
        let err = result.unwrap_err();
        assert_eq!(err.tokens, 5000);
        assert_eq!(err.target, 1000);
        assert_eq!(err.recommendations.len(), 1);
    }
}
