//! Process-wide metrics snapshot: counters, by-type breakdowns, latency
//! stats, gauges, and uptime.
//!
//! Latency samples are kept in a bounded ring rather than an unbounded
//! `Vec`, so a long-running process doesn't leak memory into its own
//! metrics; the counters are plain atomics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use supervisor_common::HealingActionKind;

const MAX_LATENCY_SAMPLES: usize = 1000;

#[derive(Default)]
struct Counters {
    healing_attempts: AtomicU64,
    successful_healings: AtomicU64,
    failed_healings: AtomicU64,
    silence_detections: AtomicU64,
    diagnoses_performed: AtomicU64,
    fallbacks_triggered: AtomicU64,
    stdin_injections_total: AtomicU64,
    restarts_total: AtomicU64,
    context_optimizations: AtomicU64,
    queued_healing_actions: AtomicU64,
    active_monitoring_contexts: AtomicU64,
}

struct Inner {
    counters: Counters,
    healing_by_type: Mutex<HashMap<String, u64>>,
    failure_by_type: Mutex<HashMap<String, u64>>,
    latency_samples_ms: Mutex<Vec<u64>>,
    started_at: chrono::DateTime<Utc>,
}

/// Process-wide metrics collector, shared across every in-flight request
/// via `Arc`.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Inner>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                counters: Counters::default(),
                healing_by_type: Mutex::new(HashMap::new()),
                failure_by_type: Mutex::new(HashMap::new()),
                latency_samples_ms: Mutex::new(Vec::new()),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn record_healing_attempt(&self) {
        self.inner.counters.healing_attempts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("supervisor_healing_attempts_total").increment(1);
    }

    pub fn record_healing_outcome(&self, action_kind: HealingActionKind, success: bool) {
        if success {
            self.inner.counters.successful_healings.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.counters.failed_healings.fetch_add(1, Ordering::Relaxed);
        }
        *self
            .inner
            .healing_by_type
            .lock()
            .entry(action_kind.as_str().to_string())
            .or_insert(0) += 1;

        match action_kind {
            HealingActionKind::StdinInjection => {
                self.inner.counters.stdin_injections_total.fetch_add(1, Ordering::Relaxed);
            }
            HealingActionKind::RestartWithFlags => {
                self.inner.counters.restarts_total.fetch_add(1, Ordering::Relaxed);
            }
            HealingActionKind::FallbackRouting | HealingActionKind::EscalateToFallback => {
                self.inner.counters.fallbacks_triggered.fetch_add(1, Ordering::Relaxed);
            }
            HealingActionKind::ContextOptimization => {
                self.inner.counters.context_optimizations.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_silence_detection(&self) {
        self.inner.counters.silence_detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_diagnosis(&self, failure_kind: &str) {
        self.inner.counters.diagnoses_performed.fetch_add(1, Ordering::Relaxed);
        *self.inner.failure_by_type.lock().entry(failure_kind.to_string()).or_insert(0) += 1;
    }

    /// Records one latency sample, keeping at most `MAX_LATENCY_SAMPLES`
    /// (oldest dropped first) so the snapshot stays bounded in size.
    pub fn record_latency(&self, latency_ms: u64) {
        let mut samples = self.inner.latency_samples_ms.lock();
        if samples.len() >= MAX_LATENCY_SAMPLES {
            samples.remove(0);
        }
        samples.push(latency_ms);
    }

    pub fn set_active_monitoring_contexts(&self, count: u64) {
        self.inner.counters.active_monitoring_contexts.store(count, Ordering::Relaxed);
    }

    pub fn set_queued_healing_actions(&self, count: u64) {
        self.inner.counters.queued_healing_actions.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.inner.latency_samples_ms.lock();
        let (average_ms, min_ms, max_ms) = if samples.is_empty() {
            (0.0, 0, 0)
        } else {
            let sum: u64 = samples.iter().sum();
            (
                sum as f64 / samples.len() as f64,
                *samples.iter().min().unwrap(),
                *samples.iter().max().unwrap(),
            )
        };

        let successful = self.inner.counters.successful_healings.load(Ordering::Relaxed);
        let attempts = self.inner.counters.healing_attempts.load(Ordering::Relaxed);
        let success_rate = if attempts == 0 {
            0.0
        } else {
            successful as f64 / attempts as f64 * 100.0
        };

        MetricsSnapshot {
            healing_attempts: attempts,
            successful_healings: successful,
            failed_healings: self.inner.counters.failed_healings.load(Ordering::Relaxed),
            silence_detections: self.inner.counters.silence_detections.load(Ordering::Relaxed),
            diagnoses_performed: self.inner.counters.diagnoses_performed.load(Ordering::Relaxed),
            fallbacks_triggered: self.inner.counters.fallbacks_triggered.load(Ordering::Relaxed),
            stdin_injections_total: self.inner.counters.stdin_injections_total.load(Ordering::Relaxed),
            restarts_total: self.inner.counters.restarts_total.load(Ordering::Relaxed),
            context_optimizations: self.inner.counters.context_optimizations.load(Ordering::Relaxed),
            healing_by_type: self.inner.healing_by_type.lock().clone(),
            failure_by_type: self.inner.failure_by_type.lock().clone(),
            latency: LatencyStats {
                average_ms,
                min_ms,
                max_ms,
                samples: samples.len(),
            },
            active_monitoring_contexts: self.inner.counters.active_monitoring_contexts.load(Ordering::Relaxed),
            queued_healing_actions: self.inner.counters.queued_healing_actions.load(Ordering::Relaxed),
            uptime_seconds: (Utc::now() - self.inner.started_at).num_seconds().max(0) as u64,
            timestamp: Utc::now(),
            success_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyStats {
    pub average_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub healing_attempts: u64,
    pub successful_healings: u64,
    pub failed_healings: u64,
    pub silence_detections: u64,
    pub diagnoses_performed: u64,
    pub fallbacks_triggered: u64,
    pub stdin_injections_total: u64,
    pub restarts_total: u64,
    pub context_optimizations: u64,
    pub healing_by_type: HashMap<String, u64>,
    pub failure_by_type: HashMap<String, u64>,
    pub latency: LatencyStats,
    pub active_monitoring_contexts: u64,
    pub queued_healing_actions: u64,
    pub uptime_seconds: u64,
    pub timestamp: chrono::DateTime<Utc>,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_with_no_attempts() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.snapshot().success_rate, 0.0);
    }

    #[test]
    fn success_rate_reflects_recorded_outcomes() {
        let collector = MetricsCollector::new();
        for _ in 0..3 {
            collector.record_healing_attempt();
        }
        collector.record_healing_outcome(HealingActionKind::StdinInjection, true);
        collector.record_healing_outcome(HealingActionKind::SimpleRetry, true);
        collector.record_healing_outcome(HealingActionKind::RestartWithFlags, false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.healing_attempts, 3);
        assert!((snapshot.success_rate - 66.66666666666667).abs() < 1e-6);
        assert_eq!(snapshot.stdin_injections_total, 1);
        assert_eq!(snapshot.restarts_total, 1);
    }

    #[test]
    fn latency_samples_are_capped() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_LATENCY_SAMPLES + 10) {
            collector.record_latency(i as u64);
        }
        assert_eq!(collector.snapshot().latency.samples, MAX_LATENCY_SAMPLES);
    }

    #[test]
    fn failure_by_type_groups_diagnoses() {
        let collector = MetricsCollector::new();
        collector.record_diagnosis("rate_limit");
        collector.record_diagnosis("rate_limit");
        collector.record_diagnosis("auth_error");
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.failure_by_type.get("rate_limit"), Some(&2));
        assert_eq!(snapshot.failure_by_type.get("auth_error"), Some(&1));
        assert_eq!(snapshot.diagnoses_performed, 3);
    }
}
