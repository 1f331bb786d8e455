//! Thin demonstration binary: wires a real CLI-backed `ProviderExecutor`
//! through the full healing pipeline (Sculptor pre-flight, the wrapped
//! provider call, Doctor classification, Recovery/Injector at the process
//! layer, Router fallback selection) end to end, keeping the orchestration
//! logic in the library crates behind a thin binary wrapper.

mod cli_provider;
mod model_registry;

use std::sync::Arc;

use supervisor_common::{
    AuditRecorder, FallbackConfig, OperationalMode, ProviderCapability, SupervisorConfig,
};
use supervisor_doctor::Doctor;
use supervisor_executor::{ExecuteOutcome, ExecuteRequest, Executor};
use supervisor_injector::Injector;
use supervisor_overwatch::{NullObserver, Overwatch};
use supervisor_router::{CapabilityRegistry, FallbackRouter, StatsTracker};
use supervisor_sculptor::ModelRegistry;
use supervisor_telemetry::{AuditLogger, MetricsCollector};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli_provider::CliProviderExecutor;
use model_registry::StaticModelRegistry;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("supervisor_executor=info,supervisor_doctor=info,supervisor_overwatch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SupervisorConfig {
        mode: OperationalMode::Autopilot,
        fallback: FallbackConfig {
            enabled: true,
            providers: vec!["claudecli".to_string(), "geminicli".to_string()],
            min_success_rate: 0.5,
        },
        ..SupervisorConfig::default()
    };

    let audit = Arc::new(AuditLogger::open("supervisor-demo-audit.log")?);
    let metrics = MetricsCollector::new();

    let overwatch = Arc::new(Overwatch::new(Arc::new(NullObserver)));
    let injector = Arc::new(Injector::new(config.injector.clone(), audit.clone() as Arc<dyn AuditRecorder>)?);

    // The CLI provider diagnoses its own process-level failures (permission
    // prompts, auth errors) to decide whether to restart with corrective
    // flags; the Executor's Doctor instance diagnoses the failures the
    // provider couldn't resolve itself, to pick a network-level remediation.
    let process_doctor = Doctor::new(config.doctor.clone(), Vec::new())?;
    let request_doctor = Doctor::new(config.doctor.clone(), Vec::new())?;

    let provider: Arc<dyn supervisor_executor::ProviderExecutor> = Arc::new(CliProviderExecutor::new(
        "claudecli".to_string(),
        overwatch,
        injector,
        process_doctor,
        config.overwatch.clone(),
        config.overwatch.max_restart_attempts,
    ));

    let capabilities = CapabilityRegistry::new(vec![ProviderCapability {
        provider_id: "geminicli".to_string(),
        max_context_size: 1_000_000,
        supports_stream: true,
        supports_cli: true,
        default_success_rate: 0.95,
        average_latency_ms: 400,
        is_available: true,
    }]);
    let router = FallbackRouter::new(config.fallback.clone(), capabilities, StatsTracker::new());

    let model_registry: Arc<dyn ModelRegistry> = Arc::new(StaticModelRegistry);

    let executor = Executor::new(
        config,
        provider,
        Some(request_doctor),
        Some(router),
        model_registry,
        audit,
        metrics,
    );

    let request = ExecuteRequest {
        provider: "claudecli".to_string(),
        model: "claude-3-opus".to_string(),
        cli_args: vec![
            "echo".to_string(),
            r#"{"status":"ok","summary":"demo request completed"}"#.to_string(),
        ],
        payload: serde_json::json!({"prompt": "summarize the attached diff"}),
        auth: serde_json::json!({}),
    };

    match executor.execute(request, None).await {
        ExecuteOutcome::Completed { payload, metadata } => {
            info!(healing_time_ms = metadata.healing_time_ms, actions = metadata.actions.len(), "request completed");
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        ExecuteOutcome::FallbackRequired { target_provider, adapted_payload, metadata } => {
            info!(target_provider = %target_provider, healing_time_ms = metadata.healing_time_ms, "fallback selected, a caller with every provider handle would re-dispatch here");
            println!("{}", serde_json::to_string_pretty(&adapted_payload)?);
        }
        ExecuteOutcome::Failed { response, metadata } => {
            error!(healing_time_ms = metadata.healing_time_ms, "request failed, every remediation path was exhausted");
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    let snapshot = executor.metrics().snapshot();
    info!(
        healing_attempts = snapshot.healing_attempts,
        successful_healings = snapshot.successful_healings,
        "demo run complete"
    );

    Ok(())
}
