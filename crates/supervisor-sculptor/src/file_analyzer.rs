//! File-reference detection and token estimation over request content, CLI
//! arguments, and the filesystem.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use supervisor_common::TokenEstimatorMode;
use walkdir::WalkDir;

use crate::token_estimator::estimate_tokens_from_bytes;

const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    ".venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "dist",
    "build",
    "target",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "rb", "php", "c", "h", "cpp", "hpp", "cs",
    "toml", "yaml", "yml", "json", "md", "txt", "sh", "sql", "proto", "graphql", "html", "css",
    "scss", "xml", "ini", "cfg", "conf", "gradle", "kt", "swift", "scala", "lua", "r", "jl",
];

/// One file the supervisor resolved as relevant to the request, with a
/// rough content excerpt kept around for Sculptor's keyword scoring and
/// exclusion summaries.
#[derive(Debug, Clone)]
pub struct AnalyzedFile {
    pub path: String,
    pub tokens: u64,
    pub content_excerpt: Option<String>,
}

/// Result of `analyze_request`: the files found plus the model budget check.
#[derive(Debug, Clone)]
pub struct RequestAnalysis {
    pub files: Vec<AnalyzedFile>,
    pub total_tokens: u64,
    pub limit: u64,
    pub exceeds_limit: bool,
}

fn unix_dotted_path_regex() -> Regex {
    Regex::new(r"\b([\w][\w\-./]*\.[A-Za-z0-9]{1,10})\b").expect("static regex")
}

fn known_extension_regex() -> Regex {
    let alternation = TEXT_EXTENSIONS.join("|");
    Regex::new(&format!(r"\b([\w][\w\-./]*\.(?:{alternation}))\b")).expect("static regex")
}

fn trailing_slash_dir_regex() -> Regex {
    Regex::new(r"\b([\w][\w\-./]*)/").expect("static regex")
}

fn has_known_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn looks_like_path(arg: &str) -> bool {
    arg.starts_with("./")
        || arg.starts_with("../")
        || arg.starts_with('/')
        || (arg.contains('/') && arg.contains('.'))
        || has_known_extension(arg)
}

/// Extracts candidate file/directory references from free text and CLI
/// arguments via three regex families plus CLI-argument heuristics.
pub fn extract_candidate_paths(content: &str, cli_args: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    let mut push = |candidate: String| {
        if seen.insert(candidate.clone()) {
            ordered.push(candidate);
        }
    };

    for regex in [unix_dotted_path_regex(), known_extension_regex(), trailing_slash_dir_regex()] {
        for capture in regex.captures_iter(content) {
            push(capture[1].to_string());
        }
    }

    for arg in cli_args {
        if looks_like_path(arg) {
            push(arg.clone());
        }
    }

    ordered
}

fn is_skippable_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name.starts_with('.')
}

fn read_excerpt(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().map(|content| content.chars().take(4000).collect())
}

/// Resolves each unique candidate path against the filesystem: files are
/// token-estimated directly, directories are walked (skipping VCS/build/
/// dependency noise and non-text extensions) and their contents summed.
pub fn resolve_files(candidates: &[String]) -> Vec<AnalyzedFile> {
    let mut resolved = Vec::new();
    for candidate in candidates {
        let path = PathBuf::from(candidate);
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        if metadata.is_file() {
            let tokens = estimate_tokens_from_bytes(metadata.len());
            resolved.push(AnalyzedFile {
                path: candidate.clone(),
                tokens,
                content_excerpt: read_excerpt(&path),
            });
        } else if metadata.is_dir() {
            for entry in WalkDir::new(&path)
                .into_iter()
                .filter_entry(|e| {
                    if e.file_type().is_dir() {
                        e.file_name().to_str().map(|n| !is_skippable_dir(n)).unwrap_or(true)
                    } else {
                        true
                    }
                })
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let entry_path = entry.path();
                if !has_known_extension(entry_path.to_string_lossy().as_ref()) {
                    continue;
                }
                let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
                resolved.push(AnalyzedFile {
                    path: entry_path.to_string_lossy().to_string(),
                    tokens: estimate_tokens_from_bytes(len),
                    content_excerpt: read_excerpt(entry_path),
                });
            }
        }
    }
    resolved
}

/// Detects file references in `content` and `cli_args`, resolves them
/// against the filesystem, and checks the sum against `limit`.
pub fn analyze_request(content: &str, cli_args: &[String], limit: u64) -> RequestAnalysis {
    let candidates = extract_candidate_paths(content, cli_args);
    let files = resolve_files(&candidates);
    let total_tokens: u64 = files.iter().map(|f| f.tokens).sum();
    RequestAnalysis {
        exceeds_limit: total_tokens > limit,
        total_tokens,
        limit,
        files,
    }
}

/// Retained for callers that want plain-text token estimation without
/// filesystem resolution (e.g. estimating the non-file portion of a
/// request body).
pub fn estimate_text_tokens(text: &str, mode: TokenEstimatorMode) -> u64 {
    crate::token_estimator::estimate_tokens(text, mode)
}
