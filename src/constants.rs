//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Provider chain constants
pub mod chain {
    /// Maximum total attempts across all providers
    pub const MAX_TOTAL_ATTEMPTS: usize = 10;

    /// Default maximum retries per provider
    pub const DEFAULT_MAX_RETRIES: u8 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Circuit breaker constants
pub mod circuit_breaker {
    /// Number of failures before opening circuit
    pub const FAILURE_THRESHOLD: u32 = 5;

    /// Duration to wait before attempting recovery (seconds)
    pub const RECOVERY_TIMEOUT_SECS: u64 = 30;

    /// Maximum requests allowed in half-open state
    pub const HALF_OPEN_MAX_REQUESTS: u32 = 3;

    /// Success threshold to close circuit from half-open
    pub const SUCCESS_THRESHOLD: u32 = 2;
}

/// Near-duplicate detection constants (S2)
pub mod dedup {
    /// MinHash permutation count
    pub const NUM_PERMUTATIONS: usize = 128;

    /// Jaccard similarity floor for a near-duplicate pair
    pub const JACCARD_THRESHOLD: f32 = 0.95;

    /// Sections shorter than this are exempt from dedup
    pub const MIN_SECTION_CHARS: usize = 50;

    /// Shingle-length candidates tried when resolving ties, shortest first
    pub const TRUNCATION_LIMITS: &[usize] = &[2000, 3000];

    /// Shingle size (characters) used to build MinHash signatures
    pub const SHINGLE_SIZE: usize = 5;
}

/// Semantic similarity constants (S5)
pub mod similarity {
    /// Neighbors retained per section
    pub const TOP_K: usize = 10;

    /// Cosine similarity floor for a retained neighbor
    pub const SIMILARITY_THRESHOLD: f32 = 0.8;

    /// IVF index probe count
    pub const IVF_NPROBE: usize = 10;

    /// Embedding vector width
    pub const EMBEDDING_DIM: usize = 768;
}

/// Cross-encoder / classification pre-filter constants (S6/S7)
pub mod filter {
    /// Minimum cross-encoder/NLI score to keep a candidate pair
    pub const NLI_THRESHOLD: f32 = 0.2;
}

/// Bulk loader constants (C3)
pub mod loader {
    /// Rows per bulk insert transaction
    pub const BATCH_SIZE: usize = 500;

    /// Retries per batch on a transient database error
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for retry backoff, doubled each attempt (seconds)
    pub const BASE_BACKOFF_SECS: u64 = 1;
}

/// LLM cascade constants (C2)
pub mod cascade {
    /// How long a preferred-but-exhausted tier is skipped before retry, Strategy A (seconds)
    pub const PREFERRED_TIER_RETRY_SECS: u64 = 600;

    /// Consecutive failures before a provider is demoted, Strategy B
    pub const RETRY_AFTER_ATTEMPTS: u32 = 100;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// Maximum retries for network requests
    pub const MAX_NETWORK_RETRIES: u32 = 3;
}
