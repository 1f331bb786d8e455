//! Injector pattern tables: canned stdin responses, gated by safety, and
//! forbidden patterns that veto every response regardless of mode.
//!
//! Same compiled-regex-table shape as the Doctor's pattern matcher, adapted:
//! where that matcher picks a diagnosis on match, the forbidden-pattern
//! check here vetoes a write, and the stdin-pattern table picks a response
//! to emit instead.

use supervisor_common::Result;

/// One canned response to an interactive prompt.
pub struct StdinPattern {
    pub name: String,
    pub regex: regex::Regex,
    /// Verbatim response, including its trailing newline.
    pub response: String,
    pub is_safe: bool,
    pub description: String,
}

impl StdinPattern {
    fn new(name: &str, pattern: &str, response: &str, is_safe: bool, description: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            regex: regex::Regex::new(pattern)?,
            response: response.to_string(),
            is_safe,
            description: description.to_string(),
        })
    }
}

/// A compiled regex whose match on content forbids *any* stdin injection
/// for that content, regardless of mode or matched `StdinPattern`.
pub struct ForbiddenPattern {
    pub regex: regex::Regex,
}

impl ForbiddenPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: regex::Regex::new(pattern)?,
        })
    }
}

pub fn default_stdin_patterns() -> Result<Vec<StdinPattern>> {
    Ok(vec![
        StdinPattern::new(
            "confirm_yes_no",
            r"(?i)\[y/n\]\s*:?\s*$",
            "y\n",
            true,
            "generic yes/no confirmation prompt",
        )?,
        StdinPattern::new(
            "confirm_trust_workspace",
            r"(?i)do you trust the (files|authors) in this (folder|directory|repository)",
            "y\n",
            true,
            "workspace-trust confirmation prompt",
        )?,
        StdinPattern::new(
            "confirm_overwrite",
            r"(?i)overwrite.*\(y/n\)",
            "y\n",
            true,
            "overwrite-existing-file confirmation",
        )?,
        StdinPattern::new(
            "press_enter_to_continue",
            r"(?i)press enter to continue",
            "\n",
            true,
            "blocking continue prompt",
        )?,
    ])
}

/// Defaults matching content patterns suggesting a destructive operation —
/// a hard block on any stdin injection, per the supervisor's
/// no-destructive-actions policy.
pub fn default_forbidden_patterns() -> Result<Vec<ForbiddenPattern>> {
    Ok(vec![
        ForbiddenPattern::new(r"(?i)rm\s+-rf\s+/")?,
        ForbiddenPattern::new(r"(?i)delete\s+all\s+(files|data|records)")?,
        ForbiddenPattern::new(r"(?i)drop\s+(table|database)")?,
        ForbiddenPattern::new(r"(?i)format\s+(disk|drive|volume)")?,
        ForbiddenPattern::new(r"(?i)this (action|operation) (cannot|can not) be undone")?,
    ])
}
