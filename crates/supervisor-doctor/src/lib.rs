//! Doctor: the two-tier failure classifier. Pattern matching runs first;
//! the LLM tier only runs when no pattern matched, and itself falls back to
//! an unknown-diagnosis when the gateway call can't be trusted.

pub mod gateway;
pub mod patterns;

pub use gateway::{extract_json, DoctorGatewayClient};
pub use patterns::{compile_custom, FailurePattern, PatternMatcher};

use supervisor_common::{Diagnosis, DiagnosticSnapshot, DoctorConfig, Result};
use tracing::debug;

/// Builds the lowercased text the pattern matcher and LLM tier both
/// classify: the snapshot's last log lines joined with its stderr buffer.
fn snapshot_content(snapshot: &DiagnosticSnapshot) -> String {
    let mut content = snapshot.last_log_lines.join("\n");
    if let Some(stderr) = &snapshot.stderr {
        content.push('\n');
        content.push_str(stderr);
    }
    content
}

pub struct Doctor {
    matcher: PatternMatcher,
    gateway: DoctorGatewayClient,
}

impl Doctor {
    pub fn new(config: DoctorConfig, custom_patterns: Vec<FailurePattern>) -> Result<Self> {
        Ok(Self {
            matcher: PatternMatcher::new(custom_patterns)?,
            gateway: DoctorGatewayClient::new(config),
        })
    }

    /// Diagnoses a failure snapshot: pattern tier first, LLM tier as
    /// fallback, unknown-diagnosis as the terminal fallback.
    pub async fn diagnose(&self, snapshot: &DiagnosticSnapshot) -> Diagnosis {
        let content = snapshot_content(snapshot);
        if let Some(diagnosis) = self.matcher.match_content(&content) {
            debug!(failure_kind = ?diagnosis.failure_kind, "doctor pattern tier matched");
            return diagnosis;
        }
        debug!("doctor pattern tier found nothing, falling back to LLM tier");
        self.gateway.classify(&content).await
    }

    pub fn pattern_count(&self) -> usize {
        self.matcher.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervisor_common::ProcessState;

    fn snapshot(lines: Vec<&str>, stderr: Option<&str>) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            timestamp: chrono::Utc::now(),
            process_state: ProcessState::Blocked,
            last_log_lines: lines.into_iter().map(String::from).collect(),
            elapsed_ms: 100,
            stderr: stderr.map(String::from),
            provider_id: "claudecli".to_string(),
            model_id: "claude-3".to_string(),
        }
    }

    #[tokio::test]
    async fn pattern_tier_short_circuits_llm_tier() {
        let config = supervisor_common::DoctorConfig {
            gateway_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let doctor = Doctor::new(config, Vec::new()).unwrap();
        let snapshot = snapshot(vec!["Allow Claude to read file.txt? [y/n]"], None);
        let diagnosis = doctor.diagnose(&snapshot).await;
        assert_eq!(diagnosis.failure_kind, supervisor_common::FailureKind::PermissionPrompt);
        assert_eq!(diagnosis.confidence, 0.8);
    }

    #[tokio::test]
    async fn unmatched_content_falls_through_to_unknown_when_gateway_unreachable() {
        let config = supervisor_common::DoctorConfig {
            gateway_base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 200,
            ..Default::default()
        };
        let doctor = Doctor::new(config, Vec::new()).unwrap();
        let snapshot = snapshot(vec!["nothing particularly informative"], None);
        let diagnosis = doctor.diagnose(&snapshot).await;
        assert_eq!(diagnosis.failure_kind, supervisor_common::FailureKind::Unknown);
        assert_eq!(diagnosis.remediation, supervisor_common::RemediationKind::Abort);
    }
}
