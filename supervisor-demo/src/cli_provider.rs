//! A real `ProviderExecutor` backed by a spawned CLI subprocess, wiring
//! Overwatch (silence/heartbeat monitoring over stdout/stderr), Injector
//! (gated stdin responses to interactive prompts) and Recovery (restart
//! planning) around the process lifecycle — the subprocess-specific
//! healing that `supervisor-executor` deliberately does not own because it
//! has no stdin/stdout handle to act on.
//!
//! Network/context/fallback healing for the same request still happens one
//! layer up, inside `supervisor_executor::Executor`, once this provider
//! returns a terminal `Ok`/`Err`.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use supervisor_common::{Error, OverwatchConfig, ProcessState, ProviderId, Result};
use supervisor_doctor::Doctor;
use supervisor_executor::provider::{ExecuteRequest, ProviderExecutor, ProviderResponse, StreamChunk};
use supervisor_injector::{InjectionContext, Injector, StdinSink};
use supervisor_overwatch::{stream_monitor, Overwatch, StreamSource};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{info, warn};
use uuid::Uuid;

/// `StdinSink` over a spawned child's stdin handle, shared between the
/// initial payload write and whatever the Injector writes later.
struct ChildStdinSink(AsyncMutex<ChildStdin>);

#[async_trait]
impl StdinSink for ChildStdinSink {
    async fn write_all(&self, data: &[u8]) -> std::io::Result<()> {
        let mut stdin = self.0.lock().await;
        stdin.write_all(data).await?;
        stdin.flush().await
    }
}

/// Spawns `request.cli_args` as a subprocess per call, piping the request
/// payload in over stdin and collecting stdout as the response payload.
pub struct CliProviderExecutor {
    provider_id: ProviderId,
    overwatch: Arc<Overwatch>,
    injector: Arc<Injector>,
    doctor: Doctor,
    overwatch_config: OverwatchConfig,
    max_restart_attempts: u32,
}

impl CliProviderExecutor {
    pub fn new(
        provider_id: ProviderId,
        overwatch: Arc<Overwatch>,
        injector: Arc<Injector>,
        doctor: Doctor,
        overwatch_config: OverwatchConfig,
        max_restart_attempts: u32,
    ) -> Self {
        Self {
            provider_id,
            overwatch,
            injector,
            doctor,
            overwatch_config,
            max_restart_attempts,
        }
    }

    /// Spawns `argv`, and on a corrective-flags diagnosis respawns with the
    /// planner's amended argv in place, up to `max_restart_attempts`.
    async fn spawn_and_run(&self, argv: &[String], payload: &serde_json::Value) -> Result<Vec<String>> {
        let mut argv = argv.to_vec();
        let mut restart_count = 0u32;

        loop {
            let program = argv
                .first()
                .ok_or_else(|| Error::InvalidRequest("cli_args must name a program".to_string()))?
                .clone();

            let mut child = Command::new(&program)
                .args(&argv[1..])
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| Error::Provider(format!("failed to spawn '{program}': {e}")))?;

            let pid = child.id().unwrap_or(0);
            let request_id = Uuid::new_v4();
            let Some(ctx) = self.overwatch.start_monitoring(
                pid,
                self.provider_id.clone(),
                String::new(),
                request_id,
                self.overwatch_config.clone(),
            ) else {
                return Err(Error::Internal("overwatch monitor is dead".to_string()));
            };

            let mut stdin = child.stdin.take().expect("stdin was piped");
            let payload_bytes = serde_json::to_vec(payload).unwrap_or_default();
            let _ = stdin.write_all(&payload_bytes).await;
            let _ = stdin.write_all(b"\n").await;
            let sink: Arc<dyn StdinSink> = Arc::new(ChildStdinSink(AsyncMutex::new(stdin)));

            let stdout = child.stdout.take().expect("stdout was piped");
            let stderr = child.stderr.take().expect("stderr was piped");

            let stdout_lines = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
            let stdout_lines_cb = stdout_lines.clone();
            let injector = self.injector.clone();
            let provider_id = self.provider_id.clone();

            stream_monitor(ctx.clone(), stdout, stderr, move |source, line| {
                if source == StreamSource::Stdout {
                    stdout_lines_cb.lock().push(line.to_string());
                }
                let injector = injector.clone();
                let sink = sink.clone();
                let inject_ctx = InjectionContext {
                    request_id,
                    provider: provider_id.clone(),
                    model: String::new(),
                };
                let line = line.to_string();
                tokio::spawn(async move {
                    let outcome = injector.try_inject(&line, sink.as_ref(), &inject_ctx).await;
                    if outcome.injected {
                        info!(request_id = %request_id, pattern = ?outcome.pattern_name, "injector answered interactive prompt");
                    }
                });
            })
            .await;

            let status = child
                .wait()
                .await
                .map_err(|e| Error::Provider(format!("failed to wait on '{program}': {e}")))?;
            self.overwatch.stop_monitoring(&request_id);

            if status.success() {
                return Ok(stdout_lines.lock().clone());
            }

            let snapshot = ctx.capture_snapshot(ProcessState::Failed);
            let diagnosis = self.doctor.diagnose(&snapshot).await;
            warn!(provider = %self.provider_id, exit_status = %status, failure_kind = ?diagnosis.failure_kind, "cli provider exited non-zero");

            if supervisor_recovery::should_attempt_restart(&diagnosis, restart_count, self.max_restart_attempts) {
                let decision =
                    supervisor_recovery::plan_restart(&diagnosis, &self.provider_id, &argv, restart_count, self.max_restart_attempts);
                if let Some(command) = decision.command {
                    info!(provider = %self.provider_id, reason = %decision.reason, "restarting with corrective flags");
                    argv = command;
                    restart_count += 1;
                    continue;
                }
            }

            return Err(Error::Provider(format!(
                "process exited with status {status}: {}",
                diagnosis.root_cause
            )));
        }
    }
}

#[async_trait]
impl ProviderExecutor for CliProviderExecutor {
    fn identifier(&self) -> &str {
        &self.provider_id
    }

    async fn execute(&self, request: &ExecuteRequest) -> Result<ProviderResponse> {
        if request.cli_args.is_empty() {
            return Err(Error::InvalidRequest("cli_args must name a program".to_string()));
        }
        let lines = self.spawn_and_run(&request.cli_args, &request.payload).await?;
        Ok(ProviderResponse {
            payload: serde_json::json!({ "output": lines.join("\n") }),
            meta: Default::default(),
        })
    }

    async fn execute_stream(&self, request: &ExecuteRequest) -> Result<mpsc::Receiver<Result<StreamChunk>>> {
        let program = request
            .cli_args
            .first()
            .ok_or_else(|| Error::InvalidRequest("cli_args must name a program".to_string()))?;

        let mut child = Command::new(program)
            .args(&request.cli_args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Provider(format!("failed to spawn '{program}': {e}")))?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let payload_bytes = serde_json::to_vec(&request.payload).unwrap_or_default();
        let _ = stdin.write_all(&payload_bytes).await;
        drop(stdin);

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Error::Provider(e.to_string()))).await;
                        break;
                    }
                }
            }
            let _ = child.wait().await;
        });

        Ok(rx)
    }

    async fn refresh(&self, auth: &serde_json::Value) -> Result<serde_json::Value> {
        Ok(auth.clone())
    }

    async fn count_tokens(&self, request: &ExecuteRequest) -> Result<u64> {
        Ok(supervisor_sculptor::estimate_tokens(
            &request.payload.to_string(),
            supervisor_common::TokenEstimatorMode::Simple,
        ))
    }
}
