//! Error types and result handling shared across the supervisor workspace

use thiserror::Error;

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the self-healing supervisor
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream provider error: {0}")]
    Provider(String),

    #[error("security error: {0}")]
    Security(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("regex compile error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("content could not be reduced to fit the model's context window: {0}")]
    UnreducibleContent(String),

    #[error("no fallback provider available")]
    NoFallbackAvailable,

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Whether a caller may usefully retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::ResourceExhausted(_)
        )
    }

    /// Error category, used as a metrics label and audit-log field.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Network(_) => "network",
            Error::Provider(_) => "provider",
            Error::Security(_) => "security",
            Error::Routing(_) => "routing",
            Error::Telemetry(_) => "telemetry",
            Error::ResourceExhausted(_) => "resource",
            Error::InvalidRequest(_) => "request",
            Error::Timeout(_) => "timeout",
            Error::Serialization(_) => "serialization",
            Error::Pattern(_) => "pattern",
            Error::UnreducibleContent(_) => "unreducible_content",
            Error::NoFallbackAvailable => "no_fallback",
            Error::Internal(_) => "internal",
            Error::Generic(_) => "generic",
        }
    }
}
