//! Injector: a gate + rewriter over a subprocess's stdin.
//!
//! `try_inject` never writes when a [`patterns::ForbiddenPattern`] matches —
//! forbidden beats every allow, full stop — and otherwise writes the first
//! matching [`patterns::StdinPattern`]'s canned response only if the
//! current mode and that pattern's safety bit both permit it.

pub mod patterns;

use std::sync::Arc;

use async_trait::async_trait;
use supervisor_common::{AuditRecorder, AuditRecorderExt, InjectorConfig, InjectorMode, ProviderId, RequestId, Result};
use tracing::{debug, warn};

pub use patterns::{default_forbidden_patterns, default_stdin_patterns, ForbiddenPattern, StdinPattern};

/// Destination for a canned response. Implemented over the monitored stdin
/// handle of the spawned provider process.
#[async_trait]
pub trait StdinSink: Send + Sync {
    async fn write_all(&self, data: &[u8]) -> std::io::Result<()>;
}

/// Per-call context used for audit logging; cheap to construct per request.
pub struct InjectionContext {
    pub request_id: RequestId,
    pub provider: ProviderId,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockedReason {
    Forbidden,
    ModeOrUnsafe,
}

/// Outcome of one `try_inject` call.
#[derive(Debug, Clone)]
pub struct InjectOutcome {
    pub pattern_name: Option<String>,
    pub injected: bool,
    pub blocked: Option<BlockedReason>,
}

impl InjectOutcome {
    fn no_match() -> Self {
        Self {
            pattern_name: None,
            injected: false,
            blocked: None,
        }
    }
}

pub struct Injector {
    mode: parking_lot::RwLock<InjectorMode>,
    stdin_patterns: Vec<StdinPattern>,
    forbidden_patterns: Vec<ForbiddenPattern>,
    audit: Arc<dyn AuditRecorder>,
}

impl Injector {
    pub fn new(config: InjectorConfig, audit: Arc<dyn AuditRecorder>) -> Result<Self> {
        let mut stdin_patterns = default_stdin_patterns()?;
        for custom in &config.custom_patterns {
            stdin_patterns.push(StdinPattern {
                name: custom.name.clone(),
                regex: regex::Regex::new(&custom.regex)?,
                response: custom.response.clone(),
                is_safe: custom.is_safe,
                description: custom.description.clone(),
            });
        }

        let mut forbidden_patterns = default_forbidden_patterns()?;
        for pattern in &config.forbidden_patterns {
            forbidden_patterns.push(ForbiddenPattern::new(pattern)?);
        }

        Ok(Self {
            mode: parking_lot::RwLock::new(config.mode),
            stdin_patterns,
            forbidden_patterns,
            audit,
        })
    }

    pub fn mode(&self) -> InjectorMode {
        *self.mode.read()
    }

    /// Changes mode at runtime.
    pub fn set_mode(&self, mode: InjectorMode) {
        *self.mode.write() = mode;
    }

    fn can_inject(&self, pattern: &StdinPattern) -> bool {
        match self.mode() {
            InjectorMode::Disabled => false,
            InjectorMode::Conservative | InjectorMode::Autopilot => pattern.is_safe,
        }
    }

    pub async fn try_inject(
        &self,
        log_content: &str,
        sink: &dyn StdinSink,
        ctx: &InjectionContext,
    ) -> InjectOutcome {
        if self.forbidden_patterns.iter().any(|p| p.regex.is_match(log_content)) {
            warn!(request_id = %ctx.request_id, "injector blocked: forbidden pattern matched");
            self.audit.record_stdin_injection(
                ctx.request_id,
                ctx.provider.clone(),
                ctx.model.clone(),
                "<forbidden>",
                "",
                "blocked_forbidden",
            );
            return InjectOutcome {
                pattern_name: None,
                injected: false,
                blocked: Some(BlockedReason::Forbidden),
            };
        }

        let Some(pattern) = self.stdin_patterns.iter().find(|p| p.regex.is_match(log_content)) else {
            return InjectOutcome::no_match();
        };

        if !self.can_inject(pattern) {
            debug!(request_id = %ctx.request_id, pattern = %pattern.name, "injector blocked: mode forbids");
            self.audit.record_stdin_injection(
                ctx.request_id,
                ctx.provider.clone(),
                ctx.model.clone(),
                pattern.name.clone(),
                pattern.response.clone(),
                "blocked_mode",
            );
            return InjectOutcome {
                pattern_name: Some(pattern.name.clone()),
                injected: false,
                blocked: Some(BlockedReason::ModeOrUnsafe),
            };
        }

        let write_result = sink.write_all(pattern.response.as_bytes()).await;
        let outcome = if write_result.is_ok() { "success" } else { "failed" };
        self.audit.record_stdin_injection(
            ctx.request_id,
            ctx.provider.clone(),
            ctx.model.clone(),
            pattern.name.clone(),
            pattern.response.clone(),
            outcome,
        );

        InjectOutcome {
            pattern_name: Some(pattern.name.clone()),
            injected: write_result.is_ok(),
            blocked: None,
        }
    }
}
