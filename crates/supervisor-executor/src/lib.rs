//! Executor: the per-request orchestrator that ties Sculptor, the wrapped
//! provider, Doctor, and the Recovery/Router remediations together.
//!
//! The Executor owns exactly one `ProviderExecutor` handle. Because of
//! that, a `fallback_provider` remediation cannot be carried out by the
//! Executor itself — it has no second handle to dispatch against. Instead
//! `execute` returns `ExecuteOutcome::FallbackRequired`, naming the chosen
//! provider and the adapted payload, and the caller-layer (the one holding
//! every provider's handle) performs the actual re-dispatch. `stdin_inject`,
//! `restart_with_flags` and `abort` remediations are likewise surfaced only
//! — they require a live subprocess stdin/stdout pair that this contract
//! deliberately does not expose; wiring those against a real CLI provider is
//! a demo-binary concern, not a core-library one.

pub mod enrichment;
pub mod executor;
pub mod provider;

pub use enrichment::{
    enrich_payload, payload_as_text, ErrorDetail, FailureSuperbrain, HealingActionSummary,
    NegotiatedFailureResponse, Superbrain,
};
pub use executor::{ExecuteOutcome, Executor};
pub use provider::{ExecuteRequest, ProviderExecutor, ProviderResponse, StreamChunk};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use supervisor_common::{
        ComponentFlags, DoctorConfig, Error, FallbackConfig, OperationalMode, ProviderCapability,
        Result, SculptorConfig, SupervisorConfig,
    };
    use supervisor_doctor::Doctor;
    use supervisor_router::{CapabilityRegistry, FallbackRouter, StatsTracker};
    use supervisor_sculptor::{ModelInfo, ModelRegistry};
    use supervisor_telemetry::{AuditLogger, MetricsCollector};
    use tokio::sync::mpsc;

    use super::*;

    struct EmptyModelRegistry;
    impl ModelRegistry for EmptyModelRegistry {
        fn models(&self) -> Vec<ModelInfo> {
            Vec::new()
        }
    }

    /// A stub provider whose `execute` always returns the preprogrammed
    /// outcome, counting how many times it was called.
    struct StubProvider {
        // Consumed front-to-back, one step per call; the last step repeats
        // once the queue is drained.
        steps: std::sync::Mutex<std::collections::VecDeque<Step>>,
        last: Step,
        calls: AtomicUsize,
        stream_fails: bool,
    }

    #[derive(Clone)]
    enum Step {
        Ok(serde_json::Value),
        NetworkErr(String),
        ProviderErr(String),
    }

    impl Step {
        fn into_result(self) -> Result<ProviderResponse> {
            match self {
                Step::Ok(payload) => Ok(ProviderResponse { payload, meta: HashMap::new() }),
                Step::NetworkErr(message) => Err(Error::Network(message)),
                Step::ProviderErr(message) => Err(Error::Provider(message)),
            }
        }
    }

    impl StubProvider {
        fn always_ok() -> Self {
            Self::new(vec![Step::Ok(serde_json::json!({"text": "ok"}))])
        }

        /// First call errors with a network message, every call after succeeds.
        fn fail_then_succeed() -> Self {
            Self::new(vec![
                Step::NetworkErr("connection reset".to_string()),
                Step::Ok(serde_json::json!({"text": "recovered"})),
            ])
        }

        fn always_fail(message: &'static str) -> Self {
            Self::new(vec![Step::ProviderErr(message.to_string())])
        }

        fn always_fail_stream() -> Self {
            let mut provider = Self::new(vec![Step::Ok(serde_json::json!({"text": "unused"}))]);
            provider.stream_fails = true;
            provider
        }

        fn new(steps: Vec<Step>) -> Self {
            let last = steps.last().cloned().unwrap_or(Step::ProviderErr("no steps configured".to_string()));
            Self {
                steps: std::sync::Mutex::new(steps.into()),
                last,
                calls: AtomicUsize::new(0),
                stream_fails: false,
            }
        }
    }

    #[async_trait]
    impl ProviderExecutor for StubProvider {
        fn identifier(&self) -> &str {
            "stub"
        }

        async fn execute(&self, _request: &ExecuteRequest) -> Result<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut steps = self.steps.lock().unwrap();
            let step = steps.pop_front().unwrap_or_else(|| self.last.clone());
            step.into_result()
        }

        async fn execute_stream(&self, _request: &ExecuteRequest) -> Result<mpsc::Receiver<Result<StreamChunk>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stream_fails {
                return Err(Error::Network("stream could not be opened".to_string()));
            }
            let (tx, rx) = mpsc::channel(4);
            for chunk in ["chunk-one".as_bytes().to_vec(), "chunk-two".as_bytes().to_vec()] {
                tx.send(Ok(chunk)).await.ok();
            }
            Ok(rx)
        }

        async fn refresh(&self, _auth: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }

        async fn count_tokens(&self, _request: &ExecuteRequest) -> Result<u64> {
            Ok(0)
        }
    }

    fn request() -> ExecuteRequest {
        ExecuteRequest {
            provider: "claudecli".to_string(),
            model: "claude-3-sonnet".to_string(),
            cli_args: Vec::new(),
            payload: serde_json::json!({"prompt": "hello"}),
            auth: serde_json::json!({}),
        }
    }

    fn audit() -> Arc<AuditLogger> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(AuditLogger::open(dir.path().join("audit.jsonl")).unwrap())
    }

    fn executor_with(
        provider: Arc<dyn ProviderExecutor>,
        config: SupervisorConfig,
        router: Option<FallbackRouter>,
    ) -> Executor {
        let doctor = if config.component_flags.doctor {
            Some(Doctor::new(DoctorConfig { gateway_base_url: "http://127.0.0.1:9".to_string(), timeout_ms: 100, ..Default::default() }, Vec::new()).unwrap())
        } else {
            None
        };
        Executor::new(
            config,
            provider,
            doctor,
            router,
            Arc::new(EmptyModelRegistry),
            audit(),
            MetricsCollector::new(),
        )
    }

    #[tokio::test]
    async fn disabled_mode_forwards_verbatim_without_enrichment() {
        let config = SupervisorConfig {
            enabled: false,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_ok()), config, None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Completed { payload, .. } => {
                assert!(payload.get("superbrain").is_none());
                assert_eq!(payload["text"], serde_json::json!("ok"));
            }
            _ => panic!("expected Completed"),
        }
    }

    #[tokio::test]
    async fn original_provider_is_seeded_from_wrapped_executor_identifier() {
        // `request().provider` is "claudecli" but `StubProvider::identifier()`
        // is "stub" — the aggregate must record the wrapped executor's own
        // identity, not whatever the caller happened to put on the request.
        let executor = executor_with(Arc::new(StubProvider::always_ok()), SupervisorConfig::default(), None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Completed { metadata, .. } => {
                assert_eq!(metadata.original_provider, "stub");
            }
            other => panic!("expected Completed, not {}", matches_label(&other)),
        }
    }

    #[tokio::test]
    async fn observe_mode_enriches_success_and_logs_failure_without_remediation() {
        let config = SupervisorConfig {
            mode: OperationalMode::Observe,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_fail("boom")), config, None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Completed { payload, metadata } => {
                assert!(payload.get("superbrain").is_none());
                assert!(metadata.actions.is_empty());
                assert!(metadata.diagnoses.is_empty());
            }
            _ => panic!("expected Completed even on upstream failure in observe mode"),
        }
    }

    #[tokio::test]
    async fn diagnose_mode_appends_diagnosis_but_does_not_remediate() {
        let config = SupervisorConfig {
            mode: OperationalMode::Diagnose,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_fail("Allow Claude to read file.txt? [y/n]")), config, None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Completed { metadata, .. } => {
                assert_eq!(metadata.diagnoses.len(), 1);
                assert!(metadata.actions.is_empty());
            }
            _ => panic!("expected Completed"),
        }
    }

    #[tokio::test]
    async fn conservative_mode_dispatches_simple_retry_and_recovers() {
        let config = SupervisorConfig {
            mode: OperationalMode::Conservative,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::fail_then_succeed()), config, None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Completed { payload, metadata } => {
                assert_eq!(payload["text"], serde_json::json!("recovered"));
                assert!(metadata.actions.iter().any(|a| a.kind == supervisor_common::HealingActionKind::SimpleRetry && a.success));
            }
            other => panic!("expected recovered Completed outcome, not a fallback/failure path: {}", matches_label(&other)),
        }
    }

    fn matches_label(outcome: &ExecuteOutcome) -> &'static str {
        match outcome {
            ExecuteOutcome::Completed { .. } => "Completed",
            ExecuteOutcome::FallbackRequired { .. } => "FallbackRequired",
            ExecuteOutcome::Failed { .. } => "Failed",
        }
    }

    #[tokio::test]
    async fn autopilot_mode_dispatches_fallback_and_returns_fallback_required() {
        let config = SupervisorConfig {
            mode: OperationalMode::Autopilot,
            fallback: FallbackConfig {
                enabled: true,
                providers: vec!["claudecli".to_string(), "geminicli".to_string()],
                min_success_rate: 0.5,
            },
            ..SupervisorConfig::default()
        };
        let capability = ProviderCapability {
            provider_id: "geminicli".to_string(),
            max_context_size: 100_000,
            supports_stream: true,
            supports_cli: true,
            default_success_rate: 0.9,
            average_latency_ms: 400,
            is_available: true,
        };
        let router = FallbackRouter::new(
            config.fallback.clone(),
            CapabilityRegistry::new(vec![capability]),
            StatsTracker::new(),
        );

        // The doctor's pattern tier proposes `fallback_provider` for an
        // invalid-credentials message.
        let executor = executor_with(
            Arc::new(StubProvider::always_fail("invalid api key provided")),
            config,
            Some(router),
        );
        match executor.execute(request(), None).await {
            ExecuteOutcome::FallbackRequired { target_provider, metadata, .. } => {
                assert_eq!(target_provider, "geminicli");
                assert_eq!(metadata.final_provider, "geminicli");
            }
            other => panic!("expected FallbackRequired, got {}", matches_label(&other)),
        }
    }

    #[tokio::test]
    async fn component_flag_disables_doctor_independent_of_mode() {
        let config = SupervisorConfig {
            mode: OperationalMode::Conservative,
            component_flags: ComponentFlags { doctor: false, ..ComponentFlags::default() },
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_fail("boom")), config, None);
        match executor.execute(request(), None).await {
            ExecuteOutcome::Failed { metadata, .. } => {
                assert!(metadata.diagnoses.is_empty());
            }
            other => panic!("expected Failed with no diagnosis recorded, got {}", matches_label(&other)),
        }
    }

    #[tokio::test]
    async fn sculptor_unreducible_content_fails_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("huge.rs");
        std::fs::write(&big, "x".repeat(2_000_000)).unwrap();

        let config = SupervisorConfig {
            mode: OperationalMode::Observe,
            sculptor: SculptorConfig { enabled: true, ..SculptorConfig::default() },
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_ok()), config, None);

        let mut req = request();
        req.model = "gpt-4".to_string();
        req.cli_args = vec![big.to_string_lossy().to_string()];
        req.payload = serde_json::json!({"prompt": "please review the attached file"});

        match executor.execute(req, None).await {
            ExecuteOutcome::Failed { response, .. } => {
                assert_eq!(response.error.code, "context_exceeded");
            }
            other => panic!("expected unreducible-content failure, got {}", matches_label(&other)),
        }
    }

    #[tokio::test]
    async fn execute_stream_passes_chunks_through_untouched() {
        let config = SupervisorConfig {
            mode: OperationalMode::Conservative,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_ok()), config, None);
        let mut rx = executor
            .execute_stream(request(), None)
            .await
            .expect("stream should open");
        let first = rx.recv().await.expect("first chunk").expect("ok chunk");
        let second = rx.recv().await.expect("second chunk").expect("ok chunk");
        assert_eq!(first, b"chunk-one");
        assert_eq!(second, b"chunk-two");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn execute_stream_initiation_failure_is_diagnosed_and_reported() {
        let config = SupervisorConfig {
            mode: OperationalMode::Diagnose,
            ..SupervisorConfig::default()
        };
        let executor = executor_with(Arc::new(StubProvider::always_fail_stream()), config, None);
        let err = executor
            .execute_stream(request(), None)
            .await
            .expect_err("stream open should fail");
        assert_eq!(err.error.message, "stream could not be opened");
    }
}
