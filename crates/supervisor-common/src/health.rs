//! Component health reporting shared by every subsystem's `health_check`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health levels for components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl HealthLevel {
    pub fn as_score(&self) -> u8 {
        match self {
            HealthLevel::Healthy => 100,
            HealthLevel::Degraded => 50,
            HealthLevel::Critical => 10,
            HealthLevel::Unknown => 0,
        }
    }
}

/// Health information for a single subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthLevel,
    pub message: String,
    pub last_check: DateTime<Utc>,
    pub metrics: HashMap<String, f32>,
}

/// Aggregate health across all subsystems the Executor owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall_health: HealthLevel,
    pub components: HashMap<String, ComponentHealth>,
    pub last_check: DateTime<Utc>,
    pub uptime_seconds: u64,
}

impl HealthStatus {
    /// Worst-case aggregation: any `Critical` wins, else any `Degraded`, else
    /// any `Unknown`, else `Healthy`. Empty component set is `Unknown`.
    pub fn calculate_overall_health(&mut self) {
        if self.components.is_empty() {
            self.overall_health = HealthLevel::Unknown;
            return;
        }

        let has = |level: HealthLevel| self.components.values().any(|c| c.status == level);

        self.overall_health = if has(HealthLevel::Critical) {
            HealthLevel::Critical
        } else if has(HealthLevel::Degraded) {
            HealthLevel::Degraded
        } else if has(HealthLevel::Unknown) {
            HealthLevel::Unknown
        } else {
            HealthLevel::Healthy
        };
    }
}
