//! Capability-aware fallback provider selection.
//!
//! A deterministic first-fit scan over a configured provider order, gated by
//! availability and a minimum success rate, rather than a weighted pick —
//! callers want the first qualifying provider, not the best-scoring one.

use supervisor_common::{Error, FallbackConfig, ProviderCapability, Result};
use tracing::{debug, warn};

use crate::capability::{CapabilityRegistry, StatsTracker};

/// Per-request constraints a fallback candidate must satisfy.
#[derive(Debug, Clone, Default)]
pub struct FallbackRequirements {
    pub requires_stream: bool,
    pub requires_cli: bool,
    pub min_context: u64,
}

/// Selects fallback providers and tracks their rolling health.
pub struct FallbackRouter {
    config: FallbackConfig,
    capabilities: CapabilityRegistry,
    stats: StatsTracker,
}

impl FallbackRouter {
    pub fn new(config: FallbackConfig, capabilities: CapabilityRegistry, stats: StatsTracker) -> Self {
        Self {
            config,
            capabilities,
            stats,
        }
    }

    /// Iterates the configured provider order, skipping `failed_provider`,
    /// and returns the first candidate satisfying every requirement. Empty
    /// provider list, fallback disabled, or no qualifying candidate all
    /// yield `Error::NoFallbackAvailable`.
    pub async fn get_fallback(
        &self,
        failed_provider: &str,
        requirements: &FallbackRequirements,
    ) -> Result<ProviderCapability> {
        if !self.config.enabled {
            return Err(Error::NoFallbackAvailable);
        }

        for provider_id in &self.config.providers {
            if provider_id == failed_provider {
                continue;
            }

            let Some(capability) = self.capabilities.get(provider_id).await else {
                debug!(provider = %provider_id, "fallback candidate has no registered capability, skipping");
                continue;
            };

            if !capability.is_available {
                continue;
            }

            let effective_rate = match self.stats.get(provider_id).await {
                Some(stats) if stats.total > 0 => stats.success_rate(),
                _ => capability.default_success_rate,
            };
            if effective_rate < self.config.min_success_rate {
                continue;
            }

            if requirements.requires_stream && !capability.supports_stream {
                continue;
            }
            if requirements.requires_cli && !capability.supports_cli {
                continue;
            }
            if capability.max_context_size < requirements.min_context {
                continue;
            }

            debug!(provider = %provider_id, %effective_rate, "selected fallback provider");
            return Ok(capability);
        }

        warn!(%failed_provider, "no fallback provider satisfied requirements");
        Err(Error::NoFallbackAvailable)
    }

    /// Records a call outcome and mirrors the recomputed success rate into
    /// the capability registry, so the next `get_fallback` call observes it.
    pub async fn update_provider_stats(&self, provider_id: &str, success: bool, latency_ms: u64, failure_reason: Option<&str>) {
        let rate = self.stats.record(provider_id, success, latency_ms, failure_reason).await;
        self.capabilities.mirror_success_rate(provider_id, rate).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(provider_id: &str) -> ProviderCapability {
        ProviderCapability {
            provider_id: provider_id.to_string(),
            max_context_size: 100_000,
            supports_stream: true,
            supports_cli: true,
            default_success_rate: 0.9,
            average_latency_ms: 500,
            is_available: true,
        }
    }

    fn router(providers: &[&str], caps: Vec<ProviderCapability>) -> FallbackRouter {
        let config = FallbackConfig {
            enabled: true,
            providers: providers.iter().map(|p| p.to_string()).collect(),
            min_success_rate: 0.5,
        };
        FallbackRouter::new(config, CapabilityRegistry::new(caps), StatsTracker::new())
    }

    #[tokio::test]
    async fn skips_failed_provider_and_returns_first_qualifying() {
        let r = router(
            &["claudecli", "geminicli", "codexcli"],
            vec![capability("claudecli"), capability("geminicli"), capability("codexcli")],
        );
        let chosen = r.get_fallback("claudecli", &FallbackRequirements::default()).await.unwrap();
        assert_eq!(chosen.provider_id, "geminicli");
    }

    #[tokio::test]
    async fn unavailable_provider_is_skipped() {
        let mut geminicli = capability("geminicli");
        geminicli.is_available = false;
        let r = router(&["geminicli", "codexcli"], vec![geminicli, capability("codexcli")]);
        let chosen = r.get_fallback("claudecli", &FallbackRequirements::default()).await.unwrap();
        assert_eq!(chosen.provider_id, "codexcli");
    }

    #[tokio::test]
    async fn disabled_fallback_always_errors() {
        let mut config = FallbackConfig::default();
        config.enabled = false;
        config.providers = vec!["geminicli".to_string()];
        let r = FallbackRouter::new(config, CapabilityRegistry::new(vec![capability("geminicli")]), StatsTracker::new());
        let result = r.get_fallback("claudecli", &FallbackRequirements::default()).await;
        assert!(matches!(result, Err(Error::NoFallbackAvailable)));
    }

    #[tokio::test]
    async fn empty_provider_list_errors() {
        let r = router(&[], vec![]);
        let result = r.get_fallback("claudecli", &FallbackRequirements::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn requirement_mismatch_is_skipped() {
        let mut geminicli = capability("geminicli");
        geminicli.supports_cli = false;
        let r = router(&["geminicli", "codexcli"], vec![geminicli, capability("codexcli")]);
        let reqs = FallbackRequirements {
            requires_cli: true,
            ..Default::default()
        };
        let chosen = r.get_fallback("claudecli", &reqs).await.unwrap();
        assert_eq!(chosen.provider_id, "codexcli");
    }

    #[tokio::test]
    async fn low_success_rate_excludes_candidate() {
        let mut geminicli = capability("geminicli");
        geminicli.default_success_rate = 0.1;
        let r = router(&["geminicli", "codexcli"], vec![geminicli, capability("codexcli")]);
        let chosen = r.get_fallback("claudecli", &FallbackRequirements::default()).await.unwrap();
        assert_eq!(chosen.provider_id, "codexcli");
    }

    #[tokio::test]
    async fn update_provider_stats_is_visible_to_subsequent_queries() {
        let r = router(&["geminicli", "codexcli"], vec![capability("geminicli"), capability("codexcli")]);
        for _ in 0..10 {
            r.update_provider_stats("geminicli", false, 100, Some("timeout")).await;
        }
        let chosen = r.get_fallback("claudecli", &FallbackRequirements::default()).await.unwrap();
        assert_eq!(chosen.provider_id, "codexcli");
    }
}
