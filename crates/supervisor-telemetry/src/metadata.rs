//! The per-request HealingMetadata aggregator: thread-safe append of
//! actions and diagnoses, last-writer-wins for the provider/optimized
//! fields, deep-copy reads.
//!
//! No channel or batching machinery — the aggregator is read far more often
//! than it's drained, so a plain lock-guarded struct is enough.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use supervisor_common::{Diagnosis, HealingAction, HealingMetadata, HighDensityMap, ProviderId, RequestId};

struct Inner {
    metadata: HealingMetadata,
    started_at: chrono::DateTime<Utc>,
}

/// Owns one request's `HealingMetadata`. Cheap to clone (`Arc` inside);
/// every clone observes the same underlying state.
#[derive(Clone)]
pub struct MetadataAggregator {
    inner: Arc<Mutex<Inner>>,
}

impl MetadataAggregator {
    pub fn new(request_id: RequestId, original_provider: impl Into<ProviderId>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                metadata: HealingMetadata::new(request_id, original_provider),
                started_at: Utc::now(),
            })),
        }
    }

    /// The request id this aggregator was created for. Cheap: no deep
    /// copy, unlike `get_metadata`.
    pub fn request_id(&self) -> RequestId {
        self.inner.lock().metadata.request_id
    }

    pub fn record_action(&self, action: HealingAction) {
        self.inner.lock().metadata.actions.push(action);
    }

    pub fn record_diagnosis(&self, diagnosis: Diagnosis) {
        self.inner.lock().metadata.diagnoses.push(diagnosis);
    }

    /// Last-writer-wins: whichever remediation actually dispatches a
    /// provider switch sets this, even if an earlier diagnosis proposed
    /// one that was abandoned.
    pub fn set_final_provider(&self, provider: impl Into<ProviderId>) {
        self.inner.lock().metadata.final_provider = provider.into();
    }

    pub fn set_context_optimized(&self, optimized: bool) {
        self.inner.lock().metadata.context_optimized = optimized;
    }

    pub fn set_high_density_map(&self, map: HighDensityMap) {
        self.inner.lock().metadata.high_density_map = Some(map);
    }

    /// Returns a deep copy of the aggregate so far; `healing_time_ms` is
    /// computed as `now - start` at read time, not at write time.
    pub fn get_metadata(&self) -> HealingMetadata {
        let guard = self.inner.lock();
        let mut snapshot = guard.metadata.clone();
        snapshot.healing_time_ms = (Utc::now() - guard.started_at).num_milliseconds().max(0) as u64;
        snapshot
    }
}
