//! The Doctor's pattern tier: a priority-ordered table of compiled regexes,
//! each mapping to a default diagnosis.
//!
//! The table is a `Vec<Regex>` compiled once at construction from configured
//! pattern strings; a bad regex fails construction instead of failing a
//! diagnosis call later.

use std::collections::HashMap;

use regex::Regex;
use supervisor_common::{Diagnosis, Error, FailureKind, RemediationKind, Result};

/// One Doctor rule: a compiled regex plus the diagnosis it produces on match.
pub struct FailurePattern {
    pub name: String,
    pub regex: Regex,
    pub failure_kind: FailureKind,
    pub default_remediation: RemediationKind,
    pub priority: i32,
    pub description: String,
    pub default_args: HashMap<String, String>,
}

impl FailurePattern {
    fn new(
        name: &str,
        pattern: &str,
        failure_kind: FailureKind,
        default_remediation: RemediationKind,
        priority: i32,
        description: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            regex: Regex::new(pattern)?,
            failure_kind,
            default_remediation,
            priority,
            description: description.to_string(),
            default_args: HashMap::new(),
        })
    }

    fn with_args(mut self, args: &[(&str, &str)]) -> Self {
        self.default_args = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    fn diagnosis(&self) -> Diagnosis {
        Diagnosis {
            failure_kind: self.failure_kind,
            root_cause: format!("Pattern '{}' matched: {}", self.name, self.description),
            confidence: 0.8,
            remediation: self.default_remediation,
            remediation_args: self.default_args.clone(),
            raw_analysis: None,
        }
    }
}

/// Priority-sorted list of `FailurePattern`s. Matching compares the
/// lowercased concatenation of the snapshot's log lines and stderr against
/// each regex in descending-priority order; the first hit wins, ties
/// broken by registration order (a stable sort preserves this).
pub struct PatternMatcher {
    patterns: Vec<FailurePattern>,
}

impl PatternMatcher {
    /// Builds the matcher from the default table plus any config-supplied
    /// custom patterns, appended after the defaults in registration order.
    pub fn new(custom: Vec<FailurePattern>) -> Result<Self> {
        let mut patterns = default_patterns()?;
        patterns.extend(custom);
        // Stable sort: equal-priority patterns keep registration order.
        patterns.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the diagnosis of the highest-priority pattern matching
    /// `content`, or `None` if nothing matches.
    pub fn match_content(&self, content: &str) -> Option<Diagnosis> {
        let lowered = content.to_lowercase();
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(&lowered))
            .map(FailurePattern::diagnosis)
    }
}

/// Compiles a custom pattern from its string form; fatal to construction on
/// a bad regex, per the component-design contract.
pub fn compile_custom(
    name: &str,
    pattern: &str,
    failure_kind: FailureKind,
    remediation: RemediationKind,
    priority: i32,
    description: &str,
) -> Result<FailurePattern> {
    FailurePattern::new(name, pattern, failure_kind, remediation, priority, description)
        .map_err(|e: Error| e)
}

fn default_patterns() -> Result<Vec<FailurePattern>> {
    Ok(vec![
        FailurePattern::new(
            "permission_prompt_yn",
            r"(?i)allow .*\?\s*\[y/n\]",
            FailureKind::PermissionPrompt,
            RemediationKind::StdinInject,
            100,
            "interactive y/n permission prompt",
        )?,
        FailurePattern::new(
            "permission_prompt_trust_dir",
            r"(?i)do you trust the (files|authors) in this (folder|directory|repository)",
            FailureKind::PermissionPrompt,
            RemediationKind::StdinInject,
            96,
            "workspace-trust confirmation prompt",
        )?,
        FailurePattern::new(
            "permission_prompt_denied",
            r"(?i)(permission denied|requires (explicit )?permission|grant permission)",
            FailureKind::PermissionPrompt,
            RemediationKind::RestartWithFlags,
            94,
            "permission denied, restart with elevated flags",
        )?
        .with_args(&[("flags", "--dangerously-skip-permissions")]),
        FailurePattern::new(
            "auth_invalid_api_key",
            r"(?i)(invalid api key|unauthorized|http\s*401)",
            FailureKind::AuthError,
            RemediationKind::FallbackProvider,
            90,
            "invalid or unauthorized credentials",
        )?,
        FailurePattern::new(
            "auth_expired_session",
            r"(?i)(token expired|session expired|please (log in|authenticate))",
            FailureKind::AuthError,
            RemediationKind::FallbackProvider,
            88,
            "expired authentication session",
        )?,
        FailurePattern::new(
            "auth_generic",
            r"(?i)auth(entication)?\s+(error|failed)",
            FailureKind::AuthError,
            RemediationKind::FallbackProvider,
            87,
            "generic authentication failure",
        )?,
        FailurePattern::new(
            "context_length_exceeded",
            r"(?i)(context length exceeded|maximum context|too many tokens)",
            FailureKind::ContextExceeded,
            RemediationKind::FallbackProvider,
            85,
            "request exceeds the model's context window",
        )?,
        FailurePattern::new(
            "context_window_full",
            r"(?i)(context window|prompt is too long)",
            FailureKind::ContextExceeded,
            RemediationKind::FallbackProvider,
            83,
            "prompt too long for the active context window",
        )?,
        FailurePattern::new(
            "rate_limit_429",
            r"(?i)(http\s*429|rate limit exceeded|too many requests)",
            FailureKind::RateLimit,
            RemediationKind::SimpleRetry,
            80,
            "upstream rate limit hit",
        )?,
        FailurePattern::new(
            "quota_exceeded",
            r"(?i)(quota exceeded|resource_exhausted)",
            FailureKind::RateLimit,
            RemediationKind::FallbackProvider,
            78,
            "provider quota exhausted",
        )?,
        FailurePattern::new(
            "network_dns_failure",
            r"(?i)(dns lookup failed|could not resolve host|name or service not known)",
            FailureKind::NetworkError,
            RemediationKind::SimpleRetry,
            70,
            "DNS resolution failure",
        )?,
        FailurePattern::new(
            "network_connection_refused",
            r"(?i)(connection refused|connection reset|econnrefused)",
            FailureKind::NetworkError,
            RemediationKind::SimpleRetry,
            69,
            "connection refused or reset by peer",
        )?,
        FailurePattern::new(
            "network_tls_error",
            r"(?i)(tls handshake|certificate verify failed|ssl error)",
            FailureKind::NetworkError,
            RemediationKind::Abort,
            67,
            "TLS handshake or certificate validation failure",
        )?,
        FailurePattern::new(
            "process_oom",
            r"(?i)(out of memory|oom[- ]?killed)",
            FailureKind::ProcessCrash,
            RemediationKind::FallbackProvider,
            60,
            "process killed for exceeding available memory",
        )?,
        FailurePattern::new(
            "process_segfault",
            r"(?i)(segmentation fault|panicked at|core dumped)",
            FailureKind::ProcessCrash,
            RemediationKind::FallbackProvider,
            58,
            "process crashed unexpectedly",
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_match_wins() {
        let matcher = PatternMatcher::new(Vec::new()).unwrap();
        let diag = matcher
            .match_content("allow Claude to read file.txt? [y/n]")
            .unwrap();
        assert_eq!(diag.failure_kind, FailureKind::PermissionPrompt);
        assert_eq!(diag.remediation, RemediationKind::StdinInject);
    }

    #[test]
    fn tls_errors_abort_rather_than_retry() {
        let matcher = PatternMatcher::new(Vec::new()).unwrap();
        let diag = matcher.match_content("tls handshake failed: certificate verify failed").unwrap();
        assert_eq!(diag.failure_kind, FailureKind::NetworkError);
        assert_eq!(diag.remediation, RemediationKind::Abort);
    }

    #[test]
    fn no_match_returns_none() {
        let matcher = PatternMatcher::new(Vec::new()).unwrap();
        assert!(matcher.match_content("everything is fine").is_none());
    }

    #[test]
    fn custom_patterns_compile_and_participate() {
        let custom = compile_custom(
            "custom_weird_error",
            r"(?i)weird internal error",
            FailureKind::Unknown,
            RemediationKind::Abort,
            200,
            "custom high priority rule",
        )
        .unwrap();
        let matcher = PatternMatcher::new(vec![custom]).unwrap();
        let diag = matcher.match_content("a weird internal error occurred").unwrap();
        assert_eq!(diag.confidence, 0.8);
    }

    #[test]
    fn bad_regex_fails_construction() {
        let result = compile_custom(
            "broken",
            "(unclosed",
            FailureKind::Unknown,
            RemediationKind::Abort,
            1,
            "broken",
        );
        assert!(result.is_err());
    }
}
