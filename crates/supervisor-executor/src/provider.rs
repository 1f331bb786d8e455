//! The wrapped `ProviderExecutor` collaborator contract: the one thing the
//! Executor calls and does not itself define the transport for.

use std::collections::HashMap;

use async_trait::async_trait;
use supervisor_common::{ProviderId, Result};
use tokio::sync::mpsc;

/// One request passed through to the wrapped provider.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub provider: ProviderId,
    pub model: String,
    pub cli_args: Vec<String>,
    pub payload: serde_json::Value,
    pub auth: serde_json::Value,
}

/// The provider's answer to one `execute` call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub payload: serde_json::Value,
    pub meta: HashMap<String, String>,
}

/// A streamed chunk. The final chunk (last one before the channel closes)
/// is what enrichment rewrites.
pub type StreamChunk = Vec<u8>;

/// An upstream provider adapter: either an HTTP API client or a locally
/// spawned CLI subprocess. The core only consumes this contract; it does
/// not define or own the transport.
#[async_trait]
pub trait ProviderExecutor: Send + Sync {
    fn identifier(&self) -> &str;

    async fn execute(&self, request: &ExecuteRequest) -> Result<ProviderResponse>;

    async fn execute_stream(&self, request: &ExecuteRequest) -> Result<mpsc::Receiver<Result<StreamChunk>>>;

    async fn refresh(&self, auth: &serde_json::Value) -> Result<serde_json::Value>;

    async fn count_tokens(&self, request: &ExecuteRequest) -> Result<u64>;
}
