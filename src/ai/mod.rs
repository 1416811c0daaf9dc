//! AI Integration Layer
//!
//! LLM cascade (remote providers, falling back to a local model), schema
//! validation, and the two cascade strategies a deployment can choose
//! between (spec §4.2).

pub mod cascade;
pub mod error_driven;
pub mod provider;
pub mod rate_limiter;
pub mod stats;
pub mod timeout;
pub mod validation;

pub use cascade::Cascade;
pub use error_driven::{CascadeStatus, ErrorDrivenCascade};
pub use provider::{
    ChainConfig, ChainedProvider, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    CircuitState, ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse, LocalProvider,
    ProviderChain, ProviderChainBuilder, ProviderConfig, RemoteProvider, ResponseMetadata,
    ResponseTiming, TokenUsage,
};
pub use rate_limiter::{BlockReason, RateLimitDecision, RateLimiter};
pub use stats::{CascadeStats, TierAttempt};
pub use timeout::{TimeoutConfig, with_timeout, with_timeout_map};
pub use validation::{JsonRepairer, ProcessedResponse, SchemaValidator, ValidationPipeline};
