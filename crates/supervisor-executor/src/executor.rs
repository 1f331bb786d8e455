//! The per-request orchestrator: Sculptor pre-flight, the wrapped
//! provider call, Doctor diagnosis on failure, and mode-gated remediation.
//!
//! A single entry point that wraps and dispatches one request: pre-flight,
//! call, diagnose-on-failure, then a Doctor-driven remediation chain rather
//! than a bare retry loop.

use std::sync::Arc;

use supervisor_common::{
    AuditRecorderExt, DiagnosticSnapshot, Error, HealingAction, HealingActionKind, OperationalMode,
    ProcessState, ProviderId, RemediationKind, SculptorConfig, SupervisorConfig,
};
use supervisor_doctor::Doctor;
use supervisor_router::{FallbackRequirements, FallbackRouter};
use supervisor_sculptor::ModelRegistry;
use supervisor_telemetry::{AuditLogger, MetadataAggregator, MetricsCollector};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::enrichment::{enrich_payload, payload_as_text, NegotiatedFailureResponse};
use crate::provider::{ExecuteRequest, ProviderExecutor, ProviderResponse, StreamChunk};

/// Outcome of one `Executor::execute` call. Unlike the wrapped
/// `ProviderExecutor`, this never surfaces a bare transport `Err` for a
/// remediable failure — every path resolves to one of these three shapes.
pub enum ExecuteOutcome {
    /// The request succeeded (possibly after remediation); payload carries
    /// the `superbrain` enrichment when enrichment is applicable.
    Completed {
        payload: serde_json::Value,
        metadata: supervisor_common::HealingMetadata,
    },
    /// A `fallback_provider` remediation was chosen. The core has only one
    /// wrapped executor handle, so it cannot re-dispatch itself; the
    /// caller-layer is expected to re-invoke against `target_provider` with
    /// `adapted_payload`.
    FallbackRequired {
        target_provider: ProviderId,
        adapted_payload: serde_json::Value,
        metadata: supervisor_common::HealingMetadata,
    },
    /// Every remediation path was exhausted or the request was
    /// uncompilable outright.
    Failed {
        response: NegotiatedFailureResponse,
        metadata: supervisor_common::HealingMetadata,
    },
}

pub struct Executor {
    config: RwLock<SupervisorConfig>,
    provider: Arc<dyn ProviderExecutor>,
    doctor: Option<Doctor>,
    router: Option<FallbackRouter>,
    model_registry: Arc<dyn ModelRegistry>,
    audit: Arc<AuditLogger>,
    metrics: MetricsCollector,
}

impl Executor {
    pub fn new(
        config: SupervisorConfig,
        provider: Arc<dyn ProviderExecutor>,
        doctor: Option<Doctor>,
        router: Option<FallbackRouter>,
        model_registry: Arc<dyn ModelRegistry>,
        audit: Arc<AuditLogger>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            provider,
            doctor,
            router,
            model_registry,
            audit,
            metrics,
        }
    }

    pub async fn set_config(&self, config: SupervisorConfig) {
        *self.config.write().await = config;
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub async fn execute(&self, mut request: ExecuteRequest, request_id: Option<Uuid>) -> ExecuteOutcome {
        let config = self.config.read().await.clone();

        if !config.enabled || config.mode == OperationalMode::Disabled {
            let response = match self.provider.execute(&request).await {
                Ok(response) => response.payload,
                Err(err) => serde_json::json!({"error": err.to_string()}),
            };
            return ExecuteOutcome::Completed {
                payload: response,
                metadata: supervisor_common::HealingMetadata::new(
                    request_id.unwrap_or_else(Uuid::new_v4),
                    self.provider.identifier(),
                ),
            };
        }

        let request_id = request_id.unwrap_or_else(Uuid::new_v4);
        let metadata = MetadataAggregator::new(request_id, self.provider.identifier());
        self.metrics.record_healing_attempt();

        if config.sculptor.enabled && config.component_flags.sculptor {
            match self.run_preflight(&request, &config.sculptor).await {
                Ok(Some((optimized_payload, high_density_map, tokens_saved))) => {
                    metadata.set_context_optimized(true);
                    metadata.set_high_density_map(high_density_map);
                    metadata.record_action(HealingAction::new(
                        HealingActionKind::ContextOptimization,
                        format!("context reshaped to fit model budget, {tokens_saved} tokens saved"),
                        true,
                    ));
                    self.metrics.record_healing_outcome(HealingActionKind::ContextOptimization, true);
                    if let Some(optimized_payload) = optimized_payload {
                        request.payload = optimized_payload;
                    }
                }
                Ok(None) => {}
                Err(unreducible) => {
                    let response = NegotiatedFailureResponse::new(
                        unreducible.message,
                        "unreducible_content",
                        "context_exceeded",
                        &metadata.get_metadata(),
                        unreducible
                            .recommendations
                            .into_iter()
                            .map(|m| format!("try model '{}' ({} token budget)", m.id, m.context_length))
                            .collect(),
                        Vec::new(),
                    );
                    return ExecuteOutcome::Failed {
                        response,
                        metadata: metadata.get_metadata(),
                    };
                }
            }
        }

        match config.mode {
            OperationalMode::Disabled => unreachable!("handled above"),
            OperationalMode::Observe => self.run_observe(request, &metadata).await,
            OperationalMode::Diagnose => self.run_diagnose(request, &metadata, &config).await,
            OperationalMode::Conservative | OperationalMode::Autopilot => {
                self.run_remediated(request, &metadata, &config).await
            }
        }
    }

    /// Streaming counterpart of `execute`. Sculptor pre-flight still runs
    /// and can reject the request outright, but once the upstream channel
    /// opens the chunks flow through untouched: the core has no terminal
    /// chunk to rewrite until the channel closes, and patching a half-sent
    /// stream after a stdin injection or restart makes no sense, so
    /// `observe`, `diagnose`, `conservative` and `autopilot` all pass
    /// chunks straight through once the stream starts. Only a failure to
    /// *open* the stream is diagnosable and reported here.
    pub async fn execute_stream(
        &self,
        request: ExecuteRequest,
        request_id: Option<Uuid>,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<supervisor_common::Result<StreamChunk>>, NegotiatedFailureResponse> {
        let config = self.config.read().await.clone();
        let request_id = request_id.unwrap_or_else(Uuid::new_v4);
        let metadata = MetadataAggregator::new(request_id, self.provider.identifier());

        if !config.enabled || config.mode == OperationalMode::Disabled {
            return self.provider.execute_stream(&request).await.map_err(|err| {
                NegotiatedFailureResponse::new(
                    err.to_string(),
                    err.category(),
                    err.category(),
                    &metadata.get_metadata(),
                    Vec::new(),
                    Vec::new(),
                )
            });
        }

        if config.sculptor.enabled && config.component_flags.sculptor {
            match self.run_preflight(&request, &config.sculptor).await {
                Ok(Some((_, high_density_map, tokens_saved))) => {
                    metadata.set_context_optimized(true);
                    metadata.set_high_density_map(high_density_map);
                    metadata.record_action(HealingAction::new(
                        HealingActionKind::ContextOptimization,
                        format!("context reshaped to fit model budget, {tokens_saved} tokens saved"),
                        true,
                    ));
                    self.metrics.record_healing_outcome(HealingActionKind::ContextOptimization, true);
                }
                Ok(None) => {}
                Err(unreducible) => {
                    return Err(NegotiatedFailureResponse::new(
                        unreducible.message,
                        "unreducible_content",
                        "context_exceeded",
                        &metadata.get_metadata(),
                        unreducible
                            .recommendations
                            .into_iter()
                            .map(|m| format!("try model '{}' ({} token budget)", m.id, m.context_length))
                            .collect(),
                        Vec::new(),
                    ));
                }
            }
        }

        match self.provider.execute_stream(&request).await {
            Ok(receiver) => Ok(receiver),
            Err(err) => {
                let doctor_modes = matches!(
                    config.mode,
                    OperationalMode::Diagnose | OperationalMode::Conservative | OperationalMode::Autopilot
                );
                if doctor_modes && config.component_flags.doctor {
                    if let Some(diagnosis) = self.diagnose(&request, &err).await {
                        metadata.record_diagnosis(diagnosis);
                    }
                }
                warn!(error = %err, "stream initiation failed, no chunks were ever sent");
                Err(NegotiatedFailureResponse::new(
                    err.to_string(),
                    err.category(),
                    err.category(),
                    &metadata.get_metadata(),
                    vec!["retry the request later".to_string()],
                    Vec::new(),
                ))
            }
        }
    }

    async fn run_preflight(
        &self,
        request: &ExecuteRequest,
        sculptor_config: &SculptorConfig,
    ) -> std::result::Result<Option<(Option<serde_json::Value>, supervisor_common::HighDensityMap, u64)>, supervisor_sculptor::UnreducibleContentError>
    {
        let content = payload_as_text(&request.payload);
        let limit = supervisor_sculptor::model_context_limit(&request.model);
        let analysis = supervisor_sculptor::analyze_request(&content, &request.cli_args, limit);
        if !analysis.exceeds_limit {
            return Ok(None);
        }

        let outcome = supervisor_sculptor::perform_pre_flight(
            analysis.files,
            limit,
            sculptor_config,
            &[],
            self.model_registry.as_ref(),
        )?;

        let Some(map) = outcome.high_density_map else {
            return Ok(None);
        };
        let tokens_saved = map.tokens_saved;
        Ok(Some((None, map, tokens_saved)))
    }

    async fn run_observe(&self, request: ExecuteRequest, metadata: &MetadataAggregator) -> ExecuteOutcome {
        match self.provider.execute(&request).await {
            Ok(response) => self.complete(response, metadata),
            Err(err) => {
                warn!(error = %err, "observe mode: upstream call failed, logging only");
                ExecuteOutcome::Completed {
                    payload: enrich_payload(serde_json::json!({"error": err.to_string()}), &metadata.get_metadata()),
                    metadata: metadata.get_metadata(),
                }
            }
        }
    }

    async fn run_diagnose(
        &self,
        request: ExecuteRequest,
        metadata: &MetadataAggregator,
        config: &SupervisorConfig,
    ) -> ExecuteOutcome {
        match self.provider.execute(&request).await {
            Ok(response) => self.complete(response, metadata),
            Err(err) => {
                if config.component_flags.doctor {
                    if let Some(diagnosis) = self.diagnose(&request, &err).await {
                        metadata.record_diagnosis(diagnosis);
                    }
                }
                ExecuteOutcome::Completed {
                    payload: enrich_payload(serde_json::json!({"error": err.to_string()}), &metadata.get_metadata()),
                    metadata: metadata.get_metadata(),
                }
            }
        }
    }

    async fn run_remediated(
        &self,
        request: ExecuteRequest,
        metadata: &MetadataAggregator,
        config: &SupervisorConfig,
    ) -> ExecuteOutcome {
        let first_attempt = self.provider.execute(&request).await;
        let err = match first_attempt {
            Ok(response) => return self.complete(response, metadata),
            Err(err) => err,
        };

        let diagnosis = if config.component_flags.doctor {
            self.diagnose(&request, &err).await
        } else {
            None
        };

        let Some(diagnosis) = diagnosis else {
            return self.fail(&err, metadata, Vec::new());
        };
        let remediation = diagnosis.remediation;
        metadata.record_diagnosis(diagnosis);

        match remediation {
            RemediationKind::FallbackProvider if config.component_flags.fallback => {
                self.dispatch_fallback(&request, metadata, &err).await
            }
            RemediationKind::SimpleRetry if config.component_flags.recovery => {
                self.dispatch_retry(request, metadata, &err).await
            }
            _ => self.fail(&err, metadata, Vec::new()),
        }
    }

    async fn dispatch_fallback(
        &self,
        request: &ExecuteRequest,
        metadata: &MetadataAggregator,
        original_err: &Error,
    ) -> ExecuteOutcome {
        let Some(router) = &self.router else {
            return self.fail(original_err, metadata, Vec::new());
        };

        let requirements = FallbackRequirements::default();
        match router.get_fallback(&request.provider, &requirements).await {
            Ok(candidate) => {
                let (adapted, _preserved) = supervisor_router::adapt_request(
                    serde_json::from_value(request.payload.clone()).unwrap_or(supervisor_router::RequestPayload {
                        model: request.model.clone(),
                        messages: Vec::new(),
                        stream: false,
                        temperature: None,
                        max_tokens: None,
                        top_p: None,
                        stop: None,
                        extra_body: None,
                        other: Default::default(),
                    }),
                    &candidate,
                );
                metadata.set_final_provider(candidate.provider_id.clone());
                metadata.record_action(HealingAction::new(
                    HealingActionKind::FallbackRouting,
                    format!("routing to fallback provider '{}'", candidate.provider_id),
                    true,
                ));
                self.metrics.record_healing_outcome(HealingActionKind::FallbackRouting, true);
                self.audit.record_fallback_routing(
                    metadata.request_id(),
                    request.provider.clone(),
                    request.model.clone(),
                    candidate.provider_id.clone(),
                    original_err.to_string(),
                    "selected",
                );
                ExecuteOutcome::FallbackRequired {
                    target_provider: candidate.provider_id,
                    adapted_payload: serde_json::to_value(adapted).unwrap_or(request.payload.clone()),
                    metadata: metadata.get_metadata(),
                }
            }
            Err(_) => {
                metadata.record_action(HealingAction::new(
                    HealingActionKind::EscalateToFallback,
                    "no fallback provider satisfied requirements".to_string(),
                    false,
                ));
                self.metrics.record_healing_outcome(HealingActionKind::EscalateToFallback, false);
                self.fail(original_err, metadata, vec![request.provider.clone()])
            }
        }
    }

    async fn dispatch_retry(
        &self,
        request: ExecuteRequest,
        metadata: &MetadataAggregator,
        original_err: &Error,
    ) -> ExecuteOutcome {
        match self.provider.execute(&request).await {
            Ok(response) => {
                metadata.record_action(HealingAction::new(HealingActionKind::SimpleRetry, "retry succeeded", true));
                self.metrics.record_healing_outcome(HealingActionKind::SimpleRetry, true);
                self.complete(response, metadata)
            }
            Err(retry_err) => {
                metadata.record_action(HealingAction::new(
                    HealingActionKind::SimpleRetry,
                    format!("retry failed: {retry_err}"),
                    false,
                ));
                self.metrics.record_healing_outcome(HealingActionKind::SimpleRetry, false);
                self.fail(original_err, metadata, Vec::new())
            }
        }
    }

    async fn diagnose(&self, request: &ExecuteRequest, err: &Error) -> Option<supervisor_common::Diagnosis> {
        let doctor = self.doctor.as_ref()?;
        let snapshot = DiagnosticSnapshot {
            timestamp: chrono::Utc::now(),
            process_state: ProcessState::Failed,
            last_log_lines: vec![err.to_string()],
            elapsed_ms: 0,
            stderr: Some(err.to_string()),
            provider_id: request.provider.clone(),
            model_id: request.model.clone(),
        };
        let diagnosis = doctor.diagnose(&snapshot).await;
        self.metrics.record_diagnosis(diagnosis.failure_kind.as_str());
        debug!(failure_kind = ?diagnosis.failure_kind, remediation = ?diagnosis.remediation, "doctor produced diagnosis");
        Some(diagnosis)
    }

    fn complete(&self, response: ProviderResponse, metadata: &MetadataAggregator) -> ExecuteOutcome {
        let snapshot = metadata.get_metadata();
        ExecuteOutcome::Completed {
            payload: enrich_payload(response.payload, &snapshot),
            metadata: snapshot,
        }
    }

    fn fail(&self, err: &Error, metadata: &MetadataAggregator, fallbacks_tried: Vec<ProviderId>) -> ExecuteOutcome {
        let snapshot = metadata.get_metadata();
        let response = NegotiatedFailureResponse::new(
            err.to_string(),
            err.category(),
            err.category(),
            &snapshot,
            vec!["retry the request later".to_string(), "check upstream provider status".to_string()],
            fallbacks_tried,
        );
        info!(request_id = %snapshot.request_id, "request failed, returning negotiated failure response");
        ExecuteOutcome::Failed { response, metadata: snapshot }
    }
}

trait FailureKindAsStr {
    fn as_str(&self) -> &'static str;
}

impl FailureKindAsStr for supervisor_common::FailureKind {
    fn as_str(&self) -> &'static str {
        match self {
            supervisor_common::FailureKind::PermissionPrompt => "permission_prompt",
            supervisor_common::FailureKind::AuthError => "auth_error",
            supervisor_common::FailureKind::ContextExceeded => "context_exceeded",
            supervisor_common::FailureKind::RateLimit => "rate_limit",
            supervisor_common::FailureKind::NetworkError => "network_error",
            supervisor_common::FailureKind::ProcessCrash => "process_crash",
            supervisor_common::FailureKind::Unknown => "unknown",
        }
    }
}
