//! Configuration contract for the self-healing supervisor.
//!
//! The supervisor does not load configuration itself (that is a
//! collaborator's job — see crate docs); these structs only need to be
//! `Deserialize` so a collaborator's TOML/JSON loader can populate them,
//! and `Default` so tests and examples can construct a sane baseline.

use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by the Executor and every subsystem it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub enabled: bool,
    pub mode: OperationalMode,
    pub component_flags: ComponentFlags,
    pub overwatch: OverwatchConfig,
    pub doctor: DoctorConfig,
    pub injector: InjectorConfig,
    pub fallback: FallbackConfig,
    pub sculptor: SculptorConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: OperationalMode::Observe,
            component_flags: ComponentFlags::default(),
            overwatch: OverwatchConfig::default(),
            doctor: DoctorConfig::default(),
            injector: InjectorConfig::default(),
            fallback: FallbackConfig::default(),
            sculptor: SculptorConfig::default(),
        }
    }
}

/// Escalating set of autonomous actions the Executor is permitted to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalMode {
    Disabled,
    Observe,
    Diagnose,
    Conservative,
    Autopilot,
}

impl OperationalMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Some(OperationalMode::Disabled),
            "observe" => Some(OperationalMode::Observe),
            "diagnose" => Some(OperationalMode::Diagnose),
            "conservative" => Some(OperationalMode::Conservative),
            "autopilot" => Some(OperationalMode::Autopilot),
            _ => None,
        }
    }
}

/// Per-subsystem enable flags, independent of `mode`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComponentFlags {
    pub overwatch: bool,
    pub doctor: bool,
    pub injector: bool,
    pub recovery: bool,
    pub fallback: bool,
    pub sculptor: bool,
}

impl Default for ComponentFlags {
    fn default() -> Self {
        Self {
            overwatch: true,
            doctor: true,
            injector: true,
            recovery: true,
            fallback: true,
            sculptor: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverwatchConfig {
    pub silence_threshold_ms: u64,
    pub log_buffer_size: usize,
    pub heartbeat_interval_ms: u64,
    pub max_restart_attempts: u32,
}

impl Default for OverwatchConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 30_000,
            log_buffer_size: 50,
            heartbeat_interval_ms: 1_000,
            max_restart_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorConfig {
    pub model: String,
    pub timeout_ms: u64,
    pub gateway_base_url: String,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-flash".to_string(),
            timeout_ms: 5_000,
            gateway_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectorMode {
    Disabled,
    Conservative,
    Autopilot,
}

impl InjectorMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Some(InjectorMode::Disabled),
            "conservative" => Some(InjectorMode::Conservative),
            "autopilot" => Some(InjectorMode::Autopilot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomStdinPattern {
    pub name: String,
    pub regex: String,
    pub response: String,
    pub is_safe: bool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectorConfig {
    pub mode: InjectorMode,
    pub custom_patterns: Vec<CustomStdinPattern>,
    pub forbidden_patterns: Vec<String>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            mode: InjectorMode::Conservative,
            custom_patterns: Vec::new(),
            forbidden_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub providers: Vec<String>,
    pub min_success_rate: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: Vec::new(),
            min_success_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEstimatorMode {
    Simple,
    Tiktoken,
}

impl TokenEstimatorMode {
    /// Unknown mode strings fall back to `Simple`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiktoken" => TokenEstimatorMode::Tiktoken,
            _ => TokenEstimatorMode::Simple,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SculptorConfig {
    pub enabled: bool,
    pub token_estimator: TokenEstimatorMode,
    pub priority_files: Vec<String>,
}

impl Default for SculptorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_estimator: TokenEstimatorMode::Simple,
            priority_files: vec![
                "README".to_string(),
                "README.md".to_string(),
                "main.rs".to_string(),
                "main.go".to_string(),
                "main.py".to_string(),
                "index.js".to_string(),
                "index.ts".to_string(),
                "package.json".to_string(),
                "go.mod".to_string(),
                "Cargo.toml".to_string(),
                "pyproject.toml".to_string(),
                "requirements.txt".to_string(),
                "pom.xml".to_string(),
                "build.gradle".to_string(),
                "Makefile".to_string(),
                "Dockerfile".to_string(),
                "docker-compose.yml".to_string(),
                "docker-compose.yaml".to_string(),
                "config.toml".to_string(),
                "config.json".to_string(),
                "config.yaml".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.overwatch.silence_threshold_ms, 30_000);
        assert_eq!(cfg.overwatch.log_buffer_size, 50);
        assert_eq!(cfg.overwatch.heartbeat_interval_ms, 1_000);
        assert_eq!(cfg.overwatch.max_restart_attempts, 2);
        assert_eq!(cfg.doctor.model, "gemini-flash");
        assert_eq!(cfg.doctor.timeout_ms, 5_000);
    }

    #[test]
    fn mode_parse_is_case_insensitive() {
        assert_eq!(OperationalMode::parse(" Autopilot "), Some(OperationalMode::Autopilot));
        assert_eq!(OperationalMode::parse("bogus"), None);
    }

    #[test]
    fn token_estimator_unknown_mode_falls_back_to_simple() {
        assert_eq!(TokenEstimatorMode::parse("bogus"), TokenEstimatorMode::Simple);
    }
}
