//! Recovery planner: a pure function from `(diagnosis, provider, argv,
//! restart_count, max_restarts)` to a [`RestartDecision`].
//!
//! Deliberately not async and not stateful — this module owns no state and
//! performs no I/O. It plans a restart; it doesn't execute one.

use supervisor_common::{Diagnosis, FailureKind, ProviderId, RemediationKind};

/// The planner's answer for one restart attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartDecision {
    pub should_restart: bool,
    pub should_escalate: bool,
    pub reason: String,
    /// Full corrected argv, only present when `should_restart` is true.
    pub command: Option<Vec<String>>,
}

impl RestartDecision {
    fn escalate(reason: impl Into<String>) -> Self {
        Self {
            should_restart: false,
            should_escalate: true,
            reason: reason.into(),
            command: None,
        }
    }

    fn restart(command: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            should_restart: true,
            should_escalate: false,
            reason: reason.into(),
            command: Some(command),
        }
    }
}

/// `should_attempt_restart` is only ever true for `permission_prompt` or
/// `auth_error` failures, `restart_with_flags` remediation, and a restart
/// count still below the max.
pub fn should_attempt_restart(diagnosis: &Diagnosis, restart_count: u32, max_restarts: u32) -> bool {
    matches!(diagnosis.failure_kind, FailureKind::PermissionPrompt | FailureKind::AuthError)
        && diagnosis.remediation == RemediationKind::RestartWithFlags
        && restart_count < max_restarts
}

/// Default corrective flags by `(provider, failure_kind)`. Missing entries
/// escalate rather than guess.
fn default_corrective_flags(provider: &str, failure_kind: FailureKind) -> Option<&'static str> {
    match (provider, failure_kind) {
        ("claudecli", FailureKind::PermissionPrompt) => Some("--dangerously-skip-permissions"),
        ("claudecli", FailureKind::AuthError) => Some("--force-auth-refresh"),
        ("geminicli", FailureKind::PermissionPrompt) => Some("--auto-approve"),
        ("geminicli", FailureKind::AuthError) => Some("--reauth"),
        ("codexcli", FailureKind::PermissionPrompt) => Some("--yes"),
        ("codexcli", FailureKind::AuthError) => Some("--refresh-token"),
        _ => None,
    }
}

/// Appends `flags` to `argv`, skipping any flag already present verbatim
/// among tokens starting with `-`.
fn dedupe_append(argv: &[String], flags: &[&str]) -> Vec<String> {
    let mut command = argv.to_vec();
    for flag in flags {
        let already_present = command
            .iter()
            .any(|tok| tok.starts_with('-') && tok == flag);
        if !already_present {
            command.push(flag.to_string());
        }
    }
    command
}

/// Plans a restart decision for one failed attempt.
pub fn plan_restart(
    diagnosis: &Diagnosis,
    provider: &ProviderId,
    argv: &[String],
    restart_count: u32,
    max_restarts: u32,
) -> RestartDecision {
    if restart_count >= max_restarts {
        return RestartDecision::escalate(format!(
            "restart_count ({restart_count}) reached max_restarts ({max_restarts})"
        ));
    }

    if diagnosis.remediation != RemediationKind::RestartWithFlags {
        return RestartDecision::escalate(format!(
            "remediation is {:?}, not restart_with_flags",
            diagnosis.remediation
        ));
    }

    let override_flags = diagnosis.remediation_args.get("flags");
    let flags: Vec<&str> = if let Some(flags) = override_flags {
        flags.split_whitespace().collect()
    } else {
        match default_corrective_flags(provider, diagnosis.failure_kind) {
            Some(flags) => vec![flags],
            None => {
                return RestartDecision::escalate(format!(
                    "no corrective flags known for provider '{provider}' and failure kind {:?}",
                    diagnosis.failure_kind
                ));
            }
        }
    };

    let command = dedupe_append(argv, &flags);
    RestartDecision::restart(command, format!("restarting {provider} with corrective flags"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn diagnosis(failure_kind: FailureKind, remediation: RemediationKind) -> Diagnosis {
        Diagnosis {
            failure_kind,
            root_cause: "test".to_string(),
            confidence: 0.8,
            remediation,
            remediation_args: HashMap::new(),
            raw_analysis: None,
        }
    }

    #[test]
    fn restart_cap_forces_escalation() {
        let diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        let decision = plan_restart(&diag, &"claudecli".to_string(), &[], 2, 2);
        assert!(decision.should_escalate);
        assert!(!decision.should_restart);
    }

    #[test]
    fn non_restart_remediation_escalates() {
        let diag = diagnosis(FailureKind::AuthError, RemediationKind::FallbackProvider);
        let decision = plan_restart(&diag, &"claudecli".to_string(), &[], 0, 2);
        assert!(decision.should_escalate);
    }

    #[test]
    fn unknown_provider_pair_escalates() {
        let diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        let decision = plan_restart(&diag, &"unknown-cli".to_string(), &[], 0, 2);
        assert!(decision.should_escalate);
    }

    #[test]
    fn known_pair_produces_command_with_default_flags() {
        let diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        let argv = vec!["claudecli".to_string(), "run".to_string()];
        let decision = plan_restart(&diag, &"claudecli".to_string(), &argv, 0, 2);
        assert!(decision.should_restart);
        assert_eq!(
            decision.command.unwrap(),
            vec!["claudecli", "run", "--dangerously-skip-permissions"]
        );
    }

    #[test]
    fn remediation_args_override_default_flags() {
        let mut diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        diag.remediation_args
            .insert("flags".to_string(), "--custom-a --custom-b".to_string());
        let decision = plan_restart(&diag, &"claudecli".to_string(), &["cli".to_string()], 0, 2);
        assert_eq!(decision.command.unwrap(), vec!["cli", "--custom-a", "--custom-b"]);
    }

    #[test]
    fn existing_flags_are_not_duplicated() {
        let diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        let argv = vec![
            "claudecli".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ];
        let decision = plan_restart(&diag, &"claudecli".to_string(), &argv, 0, 2);
        assert_eq!(
            decision.command.unwrap(),
            vec!["claudecli", "--dangerously-skip-permissions"]
        );
    }

    #[test]
    fn should_attempt_restart_gates_on_failure_kind_remediation_and_count() {
        let diag = diagnosis(FailureKind::PermissionPrompt, RemediationKind::RestartWithFlags);
        assert!(should_attempt_restart(&diag, 0, 2));
        assert!(!should_attempt_restart(&diag, 2, 2));

        let wrong_kind = diagnosis(FailureKind::NetworkError, RemediationKind::RestartWithFlags);
        assert!(!should_attempt_restart(&wrong_kind, 0, 2));

        let wrong_remediation = diagnosis(FailureKind::PermissionPrompt, RemediationKind::SimpleRetry);
        assert!(!should_attempt_restart(&wrong_remediation, 0, 2));
    }
}
