//! Sculptor: the pre-flight reshaper that keeps a request's file content
//! within the target model's context budget.

pub mod file_analyzer;
pub mod model_limits;
pub mod sculptor;
pub mod token_estimator;

pub use file_analyzer::{analyze_request, extract_candidate_paths, resolve_files, AnalyzedFile, RequestAnalysis};
pub use model_limits::{model_context_limit, recommend_models, ModelInfo, ModelRegistry};
pub use sculptor::{perform_pre_flight, PreFlightOutcome, UnreducibleContentError};
pub use token_estimator::{estimate_tokens, estimate_tokens_from_bytes};
