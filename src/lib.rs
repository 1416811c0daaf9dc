//! Legal corpus analysis pipeline
//!
//! A checkpointed, stage-based pipeline that ingests a jurisdiction's
//! legal corpus, deduplicates near-identical sections, finds similar
//! sections across jurisdictions, filters for reporting-obligation
//! language, and loads the results into SQLite — resumable at every
//! stage and driven by an LLM cascade with local fallback.
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider cascade, rate limiting, schema validation
//! - [`config`]: Layered configuration (defaults, file, environment)
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`types`]: Domain types shared across every stage
//! - [`ndjson`]: Checkpointed NDJSON reader/writer
//! - [`corpus`]: Source corpus parsing into sections and structure
//! - [`dedup`]: MinHash/LSH near-duplicate section detection
//! - [`similarity`]: Embedding-based cross-jurisdiction similarity search
//! - [`filters`]: Regex and cross-encoder reporting-obligation filters
//! - [`loader`]: Bulk NDJSON-to-SQLite loading
//! - [`stages`]: Stage orchestration, worker pool, graceful shutdown

#![recursion_limit = "256"]

pub mod ai;
pub mod config;
pub mod constants;
pub mod corpus;
pub mod dedup;
pub mod filters;
pub mod loader;
pub mod ndjson;
pub mod similarity;
pub mod stages;
pub mod storage;
pub mod types;

pub use config::{Config, ConfigLoader};
pub use types::{ErrorCategory, PipelineError, Result, ResultExt};
pub use storage::{Database, PoolConfig, SharedDatabase};
pub use ai::{Cascade, CascadeStats, LlmProvider, LlmResponse, ProviderChain, ProviderChainBuilder};
pub use stages::{run_stage, StageConfig, StageSummary};
