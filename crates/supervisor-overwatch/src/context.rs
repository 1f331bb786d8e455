//! Per-request runtime state tracked while a provider process executes.

use std::io;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use supervisor_common::{
    DiagnosticSnapshot, HealingAction, OverwatchConfig, ProcessState, ProviderId, RequestId,
    RingBuffer,
};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::debug;

struct Inner {
    pid: u32,
    start_time: Instant,
    last_output_time: Instant,
    restart_count: u32,
    diagnostic_count: u64,
    is_silent: bool,
    silence_start: Option<Instant>,
    actions: Vec<HealingAction>,
    stderr: String,
}

/// Everything Overwatch tracks for one in-flight request.
///
/// Created by [`crate::monitor::Overwatch::start_monitoring`], destroyed by
/// `stop_monitoring` or supervisor shutdown. Shared between the orchestrator
/// task and the background heartbeat observer via `Arc`.
pub struct OverwatchContext {
    pub request_id: RequestId,
    pub provider_id: ProviderId,
    pub model_id: String,
    config: OverwatchConfig,
    buffer: RingBuffer,
    inner: Mutex<Inner>,
}

impl OverwatchContext {
    pub(crate) fn new(
        pid: u32,
        provider_id: ProviderId,
        model_id: String,
        request_id: RequestId,
        config: OverwatchConfig,
    ) -> Self {
        let now = Instant::now();
        Self {
            request_id,
            provider_id,
            model_id,
            buffer: RingBuffer::new(config.log_buffer_size),
            config,
            inner: Mutex::new(Inner {
                pid,
                start_time: now,
                last_output_time: now,
                restart_count: 0,
                diagnostic_count: 0,
                is_silent: false,
                silence_start: None,
                actions: Vec::new(),
                stderr: String::new(),
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.inner.lock().pid
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.lock().restart_count
    }

    pub fn diagnostic_count(&self) -> u64 {
        self.inner.lock().diagnostic_count
    }

    pub fn is_silent(&self) -> bool {
        self.inner.lock().is_silent
    }

    /// Appends `line` to the ring buffer, bumps the last-output clock, and
    /// clears any active silence state.
    pub fn record_output(&self, line: impl Into<String>) {
        let line = line.into();
        if line.is_empty() {
            return;
        }
        self.buffer.write(line);
        let mut inner = self.inner.lock();
        inner.last_output_time = Instant::now();
        inner.is_silent = false;
        inner.silence_start = None;
    }

    /// Like [`Self::record_output`] but also accumulates into the full
    /// stderr buffer carried by `DiagnosticSnapshot`.
    pub fn record_stderr(&self, line: impl Into<String>) {
        let line = line.into();
        if line.is_empty() {
            return;
        }
        {
            let mut inner = self.inner.lock();
            if !inner.stderr.is_empty() {
                inner.stderr.push('\n');
            }
            inner.stderr.push_str(&line);
        }
        self.record_output(line);
    }

    /// Healthy iff output was seen within `silence_threshold_ms`.
    pub fn check_heartbeat(&self) -> bool {
        let last_output = self.inner.lock().last_output_time;
        last_output.elapsed() < Duration::from_millis(self.config.silence_threshold_ms)
    }

    /// Marks the context silent, returning `true` the first time this fires
    /// for a contiguous silence period (the observer's single-flight gate).
    pub(crate) fn begin_silence_if_new(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.is_silent {
            return false;
        }
        inner.is_silent = true;
        inner.silence_start = Some(Instant::now());
        true
    }

    pub fn record_action(&self, action: HealingAction) {
        self.inner.lock().actions.push(action);
    }

    pub fn actions(&self) -> Vec<HealingAction> {
        self.inner.lock().actions.clone()
    }

    pub fn can_restart(&self) -> bool {
        self.inner.lock().restart_count < self.config.max_restart_attempts
    }

    /// Rebases the clocks for a fresh process, preserving restart count and
    /// recorded healing actions.
    pub fn reset_for_restart(&self, new_pid: u32) {
        self.buffer.clear();
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.pid = new_pid;
        inner.start_time = now;
        inner.last_output_time = now;
        inner.is_silent = false;
        inner.silence_start = None;
        inner.restart_count += 1;
        inner.stderr.clear();
        debug!(request_id = %self.request_id, new_pid, restart_count = inner.restart_count, "context reset for restart");
    }

    /// Builds a [`DiagnosticSnapshot`] from the current ring buffer and
    /// elapsed time, bumping the diagnostic counter.
    pub fn capture_snapshot(&self, process_state: ProcessState) -> DiagnosticSnapshot {
        let (elapsed_ms, stderr) = {
            let mut inner = self.inner.lock();
            inner.diagnostic_count += 1;
            (
                inner.start_time.elapsed().as_millis() as u64,
                if inner.stderr.is_empty() {
                    None
                } else {
                    Some(inner.stderr.clone())
                },
            )
        };
        DiagnosticSnapshot {
            timestamp: chrono::Utc::now(),
            process_state,
            last_log_lines: self.buffer.all(),
            elapsed_ms,
            stderr,
            provider_id: self.provider_id.clone(),
            model_id: self.model_id.clone(),
        }
    }
}

/// Async line reader that records every non-empty line it yields.
pub struct MonitoredLines<R> {
    lines: Lines<BufReader<R>>,
    ctx: std::sync::Arc<OverwatchContext>,
    is_stderr: bool,
}

impl<R: tokio::io::AsyncRead + Unpin> MonitoredLines<R> {
    pub fn new(reader: R, ctx: std::sync::Arc<OverwatchContext>, is_stderr: bool) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            ctx,
            is_stderr,
        }
    }

    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let line = self.lines.next_line().await?;
        if let Some(line) = &line {
            if self.is_stderr {
                self.ctx.record_stderr(line.clone());
            } else {
                self.ctx.record_output(line.clone());
            }
        }
        Ok(line)
    }
}

/// Async writer that records every non-empty write as an output line before
/// forwarding the bytes.
pub struct MonitoredWriter<W> {
    inner: W,
    ctx: std::sync::Arc<OverwatchContext>,
}

impl<W: AsyncWrite + Unpin> MonitoredWriter<W> {
    pub fn new(inner: W, ctx: std::sync::Arc<OverwatchContext>) -> Self {
        Self { inner, ctx }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await?;
        let text = String::from_utf8_lossy(buf);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.ctx.record_output(trimmed.to_string());
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
