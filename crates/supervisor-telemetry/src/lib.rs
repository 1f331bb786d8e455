//! Telemetry: per-request HealingMetadata aggregation, the file-backed
//! audit log, and the process-wide metrics snapshot.

pub mod audit;
pub mod metadata;
pub mod metrics;

pub use audit::AuditLogger;
pub use metadata::MetadataAggregator;
pub use metrics::{LatencyStats, MetricsCollector, MetricsSnapshot};
