//! Configuration Types
//!
//! All configuration structures with sensible defaults, resolved via figment
//! (defaults < project `pipeline.toml` < `PIPELINE_`-prefixed env vars).

use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM cascade settings
    pub llm: LlmConfig,

    /// Near-duplicate detection settings (S2)
    pub dedup: DedupConfig,

    /// Semantic similarity settings (S5)
    pub similarity: SimilarityConfig,

    /// Cross-encoder pre-filter settings (S6/S7)
    pub filter: FilterConfig,

    /// Bulk loader settings (C3)
    pub loader: LoaderConfig,

    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            dedup: DedupConfig::default(),
            similarity: SimilarityConfig::default(),
            filter: FilterConfig::default(),
            loader: LoaderConfig::default(),
            database_path: "pipeline.db".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PipelineError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.dedup.num_permutations == 0 {
            return Err(PipelineError::Config(
                "dedup.num_permutations must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.dedup.jaccard_threshold) {
            return Err(PipelineError::Config(
                "dedup.jaccard_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.loader.batch_size == 0 {
            return Err(PipelineError::Config(
                "loader.batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Cascade Configuration
// =============================================================================

/// Cascade dispatch strategy (spec §4.2). Selected via `PIPELINE_LLM_CASCADE_STRATEGY`
/// since there is no CLI-flag surface to prefer over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStrategy {
    /// Strategy A: order providers by remaining rate-limit headroom.
    #[default]
    RateLimited,
    /// Strategy B: demote a provider to a failed queue after repeated errors.
    ErrorDriven,
}

impl std::fmt::Display for CascadeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeStrategy::RateLimited => write!(f, "rate_limited"),
            CascadeStrategy::ErrorDriven => write!(f, "error_driven"),
        }
    }
}

impl std::str::FromStr for CascadeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rate_limited" => Ok(CascadeStrategy::RateLimited),
            "error_driven" => Ok(CascadeStrategy::ErrorDriven),
            _ => Err(format!(
                "Unknown cascade strategy: {}. Valid values: rate_limited, error_driven",
                s
            )),
        }
    }
}

/// One entry in the LLM cascade's ordered provider ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub provider: String,
    /// Rate-limit/failure grouping key (e.g. "vertex", "groq", "ollama").
    /// Falls back to `provider` when unset.
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_rpd")]
    pub requests_per_day: u32,
}

impl ModelEntry {
    pub fn effective_tier(&self) -> &str {
        self.tier.as_deref().unwrap_or(&self.provider)
    }
}

fn default_rpm() -> u32 {
    15
}

fn default_rpd() -> u32 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Cascade dispatch strategy
    pub cascade_strategy: CascadeStrategy,

    /// Ordered remote provider ladder, richest tier first
    pub models: Vec<ModelEntry>,

    /// How long a preferred-but-exhausted tier is skipped before retry (Strategy A)
    pub preferred_tier_retry_secs: u64,

    /// Consecutive failures before a provider is demoted (Strategy B)
    pub retry_after_attempts: u32,

    /// Local (Ollama-style) fallback endpoint
    pub local_api_base: String,

    /// Local fallback model name
    pub local_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM generation (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            cascade_strategy: CascadeStrategy::default(),
            models: Vec::new(),
            preferred_tier_retry_secs: 600,
            retry_after_attempts: 100,
            local_api_base: "http://localhost:11434".to_string(),
            local_model: "llama3:latest".to_string(),
            timeout_secs: 300,
            temperature: 0.0,
        }
    }
}

// =============================================================================
// Deduplication Configuration (S2)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// MinHash permutation count
    pub num_permutations: usize,
    /// Jaccard similarity floor for a near-duplicate pair
    pub jaccard_threshold: f32,
    /// Sections shorter than this are exempt from dedup
    pub min_section_chars: usize,
    /// Shingle-length candidates tried when resolving ties (shortest-limit-wins)
    pub truncation_limits: Vec<usize>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            num_permutations: 128,
            jaccard_threshold: 0.95,
            min_section_chars: 50,
            truncation_limits: vec![2000, 3000],
        }
    }
}

// =============================================================================
// Similarity Configuration (S5)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Neighbors retained per section
    pub top_k: usize,
    /// Cosine similarity floor for a retained neighbor
    pub similarity_threshold: f32,
    /// IVF index probe count
    pub ivf_nprobe: usize,
    /// Embedding vector width
    pub embedding_dim: usize,
    /// Embedding provider endpoint (Ollama-compatible `/api/embeddings`)
    pub embedder_api_base: String,
    /// Embedding model name
    pub embedder_model: String,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.8,
            ivf_nprobe: 10,
            embedding_dim: 768,
            embedder_api_base: "http://localhost:11434".to_string(),
            embedder_model: "nomic-embed-text".to_string(),
        }
    }
}

// =============================================================================
// Filter Configuration (S6/S7)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum cross-encoder/NLI score to keep a candidate pair
    pub nli_threshold: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            nli_threshold: 0.2,
        }
    }
}

// =============================================================================
// Loader Configuration (C3)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rows per bulk insert transaction
    pub batch_size: usize,
    /// Retries per batch on a transient database error
    pub max_retries: u32,
    /// Base delay for retry backoff, doubled each attempt
    pub base_backoff_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_retries: 3,
            base_backoff_secs: 1,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.loader.batch_size, 500);
    }

    #[test]
    fn test_cascade_strategy_roundtrip() {
        assert_eq!(CascadeStrategy::RateLimited.to_string(), "rate_limited");
        assert_eq!(CascadeStrategy::ErrorDriven.to_string(), "error_driven");
        assert_eq!(
            "rate_limited".parse::<CascadeStrategy>().unwrap(),
            CascadeStrategy::RateLimited
        );
        assert_eq!(
            "error_driven".parse::<CascadeStrategy>().unwrap(),
            CascadeStrategy::ErrorDriven
        );
        assert!("bogus".parse::<CascadeStrategy>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let mut config = Config::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.loader.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_jaccard_threshold() {
        let mut config = Config::default();
        config.dedup.jaccard_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
