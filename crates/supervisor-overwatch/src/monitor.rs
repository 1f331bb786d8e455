//! The Overwatch monitor: a registry of per-request [`OverwatchContext`]s
//! each paired with a background heartbeat observer task.
//!
//! One background task per monitored request behind an
//! `Arc<Mutex<HashMap<..>>>` registry; removing the entry from the map is
//! the termination signal for its ticker task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use supervisor_common::{OverwatchConfig, ProcessState, ProviderId, RequestId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::context::{MonitoredLines, MonitoredWriter, OverwatchContext};

/// Receives the diagnostic snapshot captured the first time a request goes
/// silent. Invoked from the background heartbeat task.
#[async_trait]
pub trait SilenceObserver: Send + Sync {
    async fn on_silence(&self, ctx: &OverwatchContext);
}

/// No-op observer, useful when a caller only polls `check_heartbeat` itself.
pub struct NullObserver;

#[async_trait]
impl SilenceObserver for NullObserver {
    async fn on_silence(&self, _ctx: &OverwatchContext) {}
}

/// Registry of active per-request monitoring contexts plus their heartbeat
/// tickers.
pub struct Overwatch {
    contexts: parking_lot::Mutex<HashMap<RequestId, Arc<OverwatchContext>>>,
    dead: AtomicBool,
    observer: Arc<dyn SilenceObserver>,
}

impl Overwatch {
    pub fn new(observer: Arc<dyn SilenceObserver>) -> Self {
        Self {
            contexts: parking_lot::Mutex::new(HashMap::new()),
            dead: AtomicBool::new(false),
            observer,
        }
    }

    /// Starts monitoring a freshly spawned process. Returns `None` once the
    /// monitor has been `stop()`-ped.
    pub fn start_monitoring(
        self: &Arc<Self>,
        pid: u32,
        provider_id: ProviderId,
        model_id: String,
        request_id: RequestId,
        config: OverwatchConfig,
    ) -> Option<Arc<OverwatchContext>> {
        if self.dead.load(Ordering::SeqCst) {
            return None;
        }
        let ctx = Arc::new(OverwatchContext::new(
            pid,
            provider_id,
            model_id,
            request_id,
            config.clone(),
        ));
        self.contexts.lock().insert(request_id, ctx.clone());

        let this = self.clone();
        let heartbeat_ctx = ctx.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(config.heartbeat_interval_ms.max(1)));
            loop {
                ticker.tick().await;
                if this.dead.load(Ordering::SeqCst) {
                    return;
                }
                // The map no longer holding this request id is the
                // termination signal for this observer.
                if !this.contexts.lock().contains_key(&request_id) {
                    debug!(request_id = %request_id, "heartbeat observer exiting: context removed");
                    return;
                }
                if !heartbeat_ctx.check_heartbeat() && heartbeat_ctx.begin_silence_if_new() {
                    warn!(request_id = %request_id, "silence detected, capturing snapshot");
                    heartbeat_ctx.capture_snapshot(ProcessState::Blocked);
                    this.observer.on_silence(&heartbeat_ctx).await;
                }
            }
        });

        info!(request_id = %request_id, pid, "overwatch monitoring started");
        Some(ctx)
    }

    pub fn get(&self, request_id: &RequestId) -> Option<Arc<OverwatchContext>> {
        self.contexts.lock().get(request_id).cloned()
    }

    /// Removes the context; the heartbeat observer exits on its next tick.
    pub fn stop_monitoring(&self, request_id: &RequestId) {
        self.contexts.lock().remove(request_id);
        debug!(request_id = %request_id, "overwatch monitoring stopped");
    }

    /// Marks the monitor dead and drops every context. Subsequent
    /// `start_monitoring` calls return `None`.
    pub fn stop(&self) {
        self.dead.store(true, Ordering::SeqCst);
        self.contexts.lock().clear();
    }

    pub fn active_context_count(&self) -> usize {
        self.contexts.lock().len()
    }
}

/// Wraps a reader so every non-empty line read feeds `record_output`.
pub fn wrap_reader<R: AsyncRead + Unpin>(
    reader: R,
    ctx: Arc<OverwatchContext>,
) -> MonitoredLines<R> {
    MonitoredLines::new(reader, ctx, false)
}

/// Wraps a writer so every non-empty write feeds `record_output`.
pub fn wrap_writer<W: AsyncWrite + Unpin>(
    writer: W,
    ctx: Arc<OverwatchContext>,
) -> MonitoredWriter<W> {
    MonitoredWriter::new(writer, ctx)
}

/// Source stream a line came from, passed to `stream_monitor`'s callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Concurrently drains stdout and stderr line-by-line, invoking `on_line`
/// for each and recording output on the context (stderr lines additionally
/// accumulate into the snapshot's full stderr buffer).
pub async fn stream_monitor<Out, Err, F>(
    ctx: Arc<OverwatchContext>,
    stdout: Out,
    stderr: Err,
    mut on_line: F,
) where
    Out: AsyncRead + Unpin + Send + 'static,
    Err: AsyncRead + Unpin + Send + 'static,
    F: FnMut(StreamSource, &str) + Send,
{
    let (tx, mut rx) = mpsc::channel::<(StreamSource, String)>(256);

    let out_ctx = ctx.clone();
    let out_tx = tx.clone();
    let stdout_task = tokio::spawn(async move {
        let mut lines = MonitoredLines::new(stdout, out_ctx, false);
        while let Ok(Some(line)) = lines.next_line().await {
            if out_tx.send((StreamSource::Stdout, line)).await.is_err() {
                break;
            }
        }
    });

    let err_ctx = ctx.clone();
    let err_tx = tx;
    let stderr_task = tokio::spawn(async move {
        let mut lines = MonitoredLines::new(stderr, err_ctx, true);
        while let Ok(Some(line)) = lines.next_line().await {
            if err_tx.send((StreamSource::Stderr, line)).await.is_err() {
                break;
            }
        }
    });

    while let Some((source, line)) = rx.recv().await {
        on_line(source, &line);
    }

    let _ = tokio::join!(stdout_task, stderr_task);
}
