//! Router: capability-aware fallback provider selection and request
//! adaptation for the moment a provider call fails outright.

pub mod adapter;
pub mod capability;
pub mod router;

pub use adapter::{adapt_request, RequestPayload};
pub use capability::{CapabilityRegistry, StatsTracker};
pub use router::{FallbackRequirements, FallbackRouter};
