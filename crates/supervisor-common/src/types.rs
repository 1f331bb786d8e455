//! Shared data model for the self-healing supervisor
//!
//! Types that more than one subsystem crate needs to agree on. Types used
//! by only a single subsystem (e.g. `FailurePattern`, which only the
//! Doctor constructs) live in that subsystem's own crate instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a request flowing through the supervisor.
pub type RequestId = Uuid;

/// Identifier of an upstream provider (e.g. `"claudecli"`, `"geminicli"`).
pub type ProviderId = String;

/// One autonomous intervention taken (or attempted) on behalf of a request.
///
/// Immutable after construction — healing actions are recorded, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAction {
    pub timestamp: DateTime<Utc>,
    pub kind: HealingActionKind,
    pub description: String,
    pub success: bool,
    pub details: HashMap<String, String>,
}

impl HealingAction {
    pub fn new(kind: HealingActionKind, description: impl Into<String>, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            description: description.into(),
            success,
            details: HashMap::new(),
        }
    }

    pub fn with_details(mut self, details: HashMap<String, String>) -> Self {
        self.details = details;
        self
    }
}

/// The kind of autonomous intervention a `HealingAction` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingActionKind {
    StdinInjection,
    RestartWithFlags,
    FallbackRouting,
    SimpleRetry,
    ContextOptimization,
    EscalateToFallback,
    ContextAnalysis,
}

impl HealingActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingActionKind::StdinInjection => "stdin_injection",
            HealingActionKind::RestartWithFlags => "restart_with_flags",
            HealingActionKind::FallbackRouting => "fallback_routing",
            HealingActionKind::SimpleRetry => "simple_retry",
            HealingActionKind::ContextOptimization => "context_optimization",
            HealingActionKind::EscalateToFallback => "escalate_to_fallback",
            HealingActionKind::ContextAnalysis => "context_analysis",
        }
    }
}

/// Per-request aggregate of everything the supervisor did while handling it.
///
/// Invariant: `final_provider == original_provider` until the aggregator's
/// set-final-provider operation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingMetadata {
    pub request_id: RequestId,
    pub original_provider: ProviderId,
    pub final_provider: ProviderId,
    pub healing_time_ms: u64,
    pub actions: Vec<HealingAction>,
    pub context_optimized: bool,
    pub high_density_map: Option<HighDensityMap>,
    pub diagnoses: Vec<Diagnosis>,
}

impl HealingMetadata {
    pub fn new(request_id: RequestId, original_provider: impl Into<String>) -> Self {
        let provider = original_provider.into();
        Self {
            request_id,
            original_provider: provider.clone(),
            final_provider: provider,
            healing_time_ms: 0,
            actions: Vec::new(),
            context_optimized: false,
            high_density_map: None,
            diagnoses: Vec::new(),
        }
    }
}

/// A snapshot of process state captured at a suspected failure point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub timestamp: DateTime<Utc>,
    pub process_state: ProcessState,
    pub last_log_lines: Vec<String>,
    pub elapsed_ms: u64,
    pub stderr: Option<String>,
    pub provider_id: ProviderId,
    pub model_id: String,
}

/// Tag describing the state of the monitored process at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Blocked,
    Terminated,
    Failed,
}

/// Doctor's classification of a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub failure_kind: FailureKind,
    pub root_cause: String,
    pub confidence: f32,
    pub remediation: RemediationKind,
    pub remediation_args: HashMap<String, String>,
    pub raw_analysis: Option<String>,
}

/// Closed enumeration of failure kinds the Doctor can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionPrompt,
    AuthError,
    ContextExceeded,
    RateLimit,
    NetworkError,
    ProcessCrash,
    Unknown,
}

impl FailureKind {
    /// Case-insensitive, whitespace-trimmed parse; unrecognized values map to `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "permission_prompt" | "permission-prompt" => FailureKind::PermissionPrompt,
            "auth_error" | "auth-error" => FailureKind::AuthError,
            "context_exceeded" | "context-exceeded" => FailureKind::ContextExceeded,
            "rate_limit" | "rate-limit" => FailureKind::RateLimit,
            "network_error" | "network-error" => FailureKind::NetworkError,
            "process_crash" | "process-crash" => FailureKind::ProcessCrash,
            _ => FailureKind::Unknown,
        }
    }
}

/// Closed enumeration of remediation kinds the Doctor can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
    StdinInject,
    RestartWithFlags,
    FallbackProvider,
    SimpleRetry,
    Abort,
}

impl RemediationKind {
    /// Case-insensitive, whitespace-trimmed parse; unrecognized values map to `Abort`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin_inject" | "stdin-inject" => RemediationKind::StdinInject,
            "restart_with_flags" | "restart-with-flags" => RemediationKind::RestartWithFlags,
            "fallback_provider" | "fallback" | "fallback-provider" => {
                RemediationKind::FallbackProvider
            }
            "simple_retry" | "retry" | "simple-retry" => RemediationKind::SimpleRetry,
            _ => RemediationKind::Abort,
        }
    }
}

impl Diagnosis {
    /// The Doctor's terminal answer when nothing classified the failure.
    pub fn unknown() -> Self {
        Self {
            failure_kind: FailureKind::Unknown,
            root_cause: "No known failure pattern matched.".to_string(),
            confidence: 0.0,
            remediation: RemediationKind::Abort,
            remediation_args: HashMap::new(),
            raw_analysis: None,
        }
    }
}

/// Excluded-content ledger emitted by the Sculptor when it drops files to
/// stay within a model's context budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighDensityMap {
    pub total_files: usize,
    pub included_files: usize,
    pub excluded_files: usize,
    pub directory_tree: String,
    pub excluded_summaries: HashMap<String, String>,
    pub tokens_saved: u64,
}

/// Static, mostly-configured attributes of an upstream provider.
///
/// `is_available` is the one field mutated at runtime (by the Router, under
/// a write lock, as health checks and failures come in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapability {
    pub provider_id: ProviderId,
    pub max_context_size: u64,
    pub supports_stream: bool,
    pub supports_cli: bool,
    pub default_success_rate: f32,
    pub average_latency_ms: u64,
    pub is_available: bool,
}

/// Rolling per-provider counters maintained by the Router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderStats {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub cumulative_latency_ms: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub failure_reasons: HashMap<String, u64>,
}

impl ProviderStats {
    /// `success / total`, defaulting to 1.0 when no calls have been recorded yet.
    pub fn success_rate(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.success as f32 / self.total as f32
        }
    }

    pub fn record(&mut self, success: bool, latency_ms: u64, failure_reason: Option<&str>) {
        self.total += 1;
        self.cumulative_latency_ms += latency_ms;
        if success {
            self.success += 1;
            self.last_success = Some(Utc::now());
        } else {
            self.failure += 1;
            self.last_failure = Some(Utc::now());
            if let Some(reason) = failure_reason {
                *self.failure_reasons.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
    }
}

/// One append-only audit-log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: RequestId,
    pub action_type: String,
    pub provider: ProviderId,
    pub model: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub action_details: HashMap<String, String>,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identifier: Option<String>,
}
