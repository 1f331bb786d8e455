//! The audit-log recording contract shared by every subsystem that takes an
//! autonomous action. The concrete sink (file, rotation, compression) is a
//! collaborator concern — see `supervisor-telemetry::audit` for the
//! reference implementation — but the recording *interface* lives here so
//! Doctor/Injector/Router/Recovery can each depend on it without pulling in
//! telemetry's full aggregation machinery.

use std::collections::HashMap;

use chrono::Utc;

use crate::types::{AuditLogEntry, ProviderId, RequestId};

/// Anything that can durably record one audit-log line.
///
/// Implementations must not block the caller's request path on failure —
/// `record` takes `&self` and is expected to hand off to a background
/// writer or otherwise fail open.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, entry: AuditLogEntry);
}

/// Convenience constructors for the named recorder shapes in the external
/// interface contract. Each builds an `AuditLogEntry` and forwards to
/// `record`.
pub trait AuditRecorderExt: AuditRecorder {
    fn record_stdin_injection(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        pattern_name: impl Into<String>,
        response: impl Into<String>,
        outcome: impl Into<String>,
    ) {
        let mut details = HashMap::new();
        details.insert("pattern".to_string(), pattern_name.into());
        details.insert("response".to_string(), response.into());
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "stdin_injection".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: outcome.into(),
            user_identifier: None,
        });
    }

    fn record_restart_with_flags(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        flags: impl Into<String>,
        outcome: impl Into<String>,
    ) {
        let mut details = HashMap::new();
        details.insert("flags".to_string(), flags.into());
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "restart_with_flags".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: outcome.into(),
            user_identifier: None,
        });
    }

    fn record_fallback_routing(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        fallback_provider: impl Into<String>,
        reason: impl Into<String>,
        outcome: impl Into<String>,
    ) {
        let mut details = HashMap::new();
        details.insert("fallback_provider".to_string(), fallback_provider.into());
        details.insert("reason".to_string(), reason.into());
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "fallback_routing".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: outcome.into(),
            user_identifier: None,
        });
    }

    fn record_context_optimization(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        original_tokens: u64,
        optimized_tokens: u64,
        outcome: impl Into<String>,
    ) {
        let mut details = HashMap::new();
        details.insert("original_tokens".to_string(), original_tokens.to_string());
        details.insert("optimized_tokens".to_string(), optimized_tokens.to_string());
        details.insert(
            "tokens_saved".to_string(),
            original_tokens.saturating_sub(optimized_tokens).to_string(),
        );
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "context_optimization".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: outcome.into(),
            user_identifier: None,
        });
    }

    fn record_diagnosis(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        failure_type: impl Into<String>,
        remediation: impl Into<String>,
        confidence: f32,
    ) {
        let mut details = HashMap::new();
        details.insert("failure_type".to_string(), failure_type.into());
        details.insert("remediation".to_string(), remediation.into());
        details.insert("confidence".to_string(), confidence.to_string());
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "diagnosis".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: "recorded".to_string(),
            user_identifier: None,
        });
    }

    fn record_silence_detection(
        &self,
        request_id: RequestId,
        provider: ProviderId,
        model: impl Into<String>,
        silence_duration_ms: u64,
    ) {
        let mut details = HashMap::new();
        details.insert("silence_duration_ms".to_string(), silence_duration_ms.to_string());
        self.record(AuditLogEntry {
            timestamp: Utc::now(),
            request_id,
            action_type: "silence_detection".to_string(),
            provider,
            model: model.into(),
            action_details: details,
            outcome: "detected".to_string(),
            user_identifier: None,
        });
    }
}

impl<T: AuditRecorder + ?Sized> AuditRecorderExt for T {}

/// An `AuditRecorder` that discards everything. Used in tests and as the
/// default when no collaborator sink is wired in.
pub struct NullAuditRecorder;

impl AuditRecorder for NullAuditRecorder {
    fn record(&self, _entry: AuditLogEntry) {}
}
