//! Cascade dispatch: picks the next provider tier to try and hands the
//! actual call off to [`ChainedProvider`], layering Strategy A/B ordering
//! (spec §4.2) on top of the generic retry/circuit-breaker machinery in
//! [`super::provider::chain`].

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{CascadeStrategy, LlmConfig, ModelEntry};
use crate::constants::chain as chain_constants;
use crate::types::{ErrorClassifier, PipelineError, Result};

use super::error_driven::ErrorDrivenCascade;
use super::provider::{ChainedProvider, LlmResponse};
use super::rate_limiter::{BlockReason, RateLimitDecision, RateLimiter};
use super::stats::CascadeStats;

/// Orders an already-built ladder of [`ChainedProvider`]s by the configured
/// [`CascadeStrategy`] and drives calls against them one tier at a time.
pub struct Cascade {
    providers: Vec<ChainedProvider>,
    strategy: CascadeStrategy,
    rate_limiter: RateLimiter,
    error_driven: ErrorDrivenCascade,
    tier_models: HashMap<String, ModelEntry>,
    preferred_tier_retry_secs: u64,
    max_total_attempts: usize,
}

impl Cascade {
    /// `providers` must already be ordered richest-tier-first (i.e. by
    /// `ChainedProvider::priority`); tier grouping comes from each rung's
    /// `tier` field.
    pub fn new(providers: Vec<ChainedProvider>, llm_config: &LlmConfig) -> Self {
        let mut ordered = providers;
        ordered.sort_by_key(|p| p.priority);

        let tiers: Vec<String> = dedup_preserving_order(ordered.iter().map(|p| p.tier.clone()));

        let mut tier_models = HashMap::new();
        for model in &llm_config.models {
            tier_models
                .entry(model.effective_tier().to_string())
                .or_insert_with(|| model.clone());
        }

        Self {
            providers: ordered,
            strategy: llm_config.cascade_strategy,
            rate_limiter: RateLimiter::new(),
            error_driven: ErrorDrivenCascade::new(tiers, llm_config.retry_after_attempts as u64),
            tier_models,
            preferred_tier_retry_secs: llm_config.preferred_tier_retry_secs,
            max_total_attempts: chain_constants::MAX_TOTAL_ATTEMPTS,
        }
    }

    /// Run the cascade to completion: try tiers in strategy order until one
    /// succeeds or every candidate has been exhausted.
    pub async fn generate(&self, prompt: &str, schema: &Value) -> Result<(LlmResponse, CascadeStats)> {
        let mut stats = CascadeStats::default();
        stats.start();
        let mut last_error: Option<PipelineError> = None;

        for _ in 0..self.max_total_attempts {
            let Some(rung) = self.select_next().await else {
                break;
            };

            match rung.provider.generate(prompt, schema).await {
                Ok(response) => {
                    self.record_success(&rung.tier);
                    stats.record_attempt(&rung.tier, None);
                    stats.finish(Some(rung.tier.clone()));
                    return Ok((response, stats));
                }
                Err(err) => {
                    let classified =
                        ErrorClassifier::classify_pipeline_error(&err, rung.provider.name());
                    tracing::warn!(
                        tier = %rung.tier,
                        provider = rung.provider.name(),
                        category = ?classified.category,
                        "cascade tier failed"
                    );
                    self.record_failure(&rung.tier, &classified);
                    stats.record_attempt(&rung.tier, Some(classified.category));
                    last_error = Some(err);
                }
            }
        }

        stats.finish(None);
        tracing::error!(summary = %stats.summary(), "cascade exhausted all tiers");
        Err(last_error.unwrap_or_else(|| {
            PipelineError::LlmApi("cascade exhausted all tiers with no providers configured".into())
        }))
    }

    async fn select_next(&self) -> Option<&ChainedProvider> {
        match self.strategy {
            CascadeStrategy::RateLimited => self.select_next_rate_limited().await,
            CascadeStrategy::ErrorDriven => self.select_next_error_driven(),
        }
    }

    /// Picks the next tier eligible under Strategy A. A tier the rate
    /// limiter says to wait out (per-minute window full, not daily-quota
    /// blocked) is still reachable this call — if no tier is immediately
    /// proceed-able, the shortest such wait is slept out once and that
    /// tier retried, rather than treating `WaitThenRetry` the same as an
    /// outright `Blocked` tier and falling straight out of the cascade.
    async fn select_next_rate_limited(&self) -> Option<&ChainedProvider> {
        let mut shortest_wait: Option<(usize, std::time::Duration)> = None;

        for (index, rung) in self.providers.iter().enumerate() {
            let Some(model) = self.tier_models.get(&rung.tier) else {
                // No declared rate limit for this tier (e.g. the local fallback): always eligible.
                return Some(rung);
            };
            match self
                .rate_limiter
                .check(&rung.tier, model, self.preferred_tier_retry_secs)
            {
                RateLimitDecision::Proceed => return Some(rung),
                RateLimitDecision::WaitThenRetry(wait) => {
                    if shortest_wait.is_none_or(|(_, best)| wait < best) {
                        shortest_wait = Some((index, wait));
                    }
                }
                RateLimitDecision::Blocked(_) => continue,
            }
        }

        let (index, wait) = shortest_wait?;
        tracing::info!(tier = %self.providers[index].tier, wait_secs = wait.as_secs(), "waiting out per-minute rate limit");
        tokio::time::sleep(wait).await;
        Some(&self.providers[index])
    }

    fn select_next_error_driven(&self) -> Option<&ChainedProvider> {
        let tier = self.error_driven.next_tier()?;
        self.providers.iter().find(|p| p.tier == tier)
    }

    fn record_success(&self, tier: &str) {
        match self.strategy {
            CascadeStrategy::RateLimited => self.rate_limiter.record_call(tier),
            CascadeStrategy::ErrorDriven => self.error_driven.mark_success(tier),
        }
    }

    fn record_failure(&self, tier: &str, classified: &crate::types::LlmError) {
        match self.strategy {
            CascadeStrategy::RateLimited => {
                if classified.category == crate::types::ErrorCategory::RateLimit {
                    let wait = classified
                        .retry_after
                        .unwrap_or(std::time::Duration::from_secs(
                            self.preferred_tier_retry_secs,
                        ));
                    self.rate_limiter.block(
                        tier,
                        wait,
                        BlockReason::RateLimited(classified.message.clone()),
                    );
                }
            }
            CascadeStrategy::ErrorDriven => self.error_driven.mark_failure(tier),
        }
    }
}

fn dedup_preserving_order(iter: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in iter {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}
