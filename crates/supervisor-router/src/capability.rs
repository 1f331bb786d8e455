//! Shared provider capability and rolling-stats registries.
//!
//! A single-writer/multi-reader lock over small per-provider structs,
//! point-updated as health checks and call outcomes come in.

use std::collections::HashMap;
use std::sync::Arc;

use supervisor_common::{ProviderCapability, ProviderId, ProviderStats};
use tokio::sync::RwLock;

/// Static-ish, runtime-mutable-in-`is_available` capability facts per
/// provider, shared by every request through a read-mostly lock.
#[derive(Clone)]
pub struct CapabilityRegistry {
    inner: Arc<RwLock<HashMap<ProviderId, ProviderCapability>>>,
}

impl CapabilityRegistry {
    pub fn new(capabilities: Vec<ProviderCapability>) -> Self {
        let map = capabilities.into_iter().map(|c| (c.provider_id.clone(), c)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn get(&self, provider_id: &str) -> Option<ProviderCapability> {
        self.inner.read().await.get(provider_id).cloned()
    }

    pub async fn all(&self) -> Vec<ProviderCapability> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn set_available(&self, provider_id: &str, available: bool) {
        if let Some(cap) = self.inner.write().await.get_mut(provider_id) {
            cap.is_available = available;
        }
    }

    pub async fn set_average_latency(&self, provider_id: &str, latency_ms: u64) {
        if let Some(cap) = self.inner.write().await.get_mut(provider_id) {
            cap.average_latency_ms = latency_ms;
        }
    }

    /// Mirrors a freshly computed success rate into the capability, so
    /// subsequent fallback queries that only read capability defaults
    /// still see it.
    pub async fn mirror_success_rate(&self, provider_id: &str, success_rate: f32) {
        if let Some(cap) = self.inner.write().await.get_mut(provider_id) {
            cap.default_success_rate = success_rate;
        }
    }
}

/// Rolling per-provider call outcome counters.
#[derive(Clone)]
pub struct StatsTracker {
    inner: Arc<RwLock<HashMap<ProviderId, ProviderStats>>>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, provider_id: &str) -> Option<ProviderStats> {
        self.inner.read().await.get(provider_id).cloned()
    }

    pub async fn record(&self, provider_id: &str, success: bool, latency_ms: u64, failure_reason: Option<&str>) -> f32 {
        let mut guard = self.inner.write().await;
        let stats = guard.entry(provider_id.to_string()).or_default();
        stats.record(success, latency_ms, failure_reason);
        stats.success_rate()
    }
}
