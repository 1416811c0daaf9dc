//! Cascade execution statistics (spec §4.2.5).
//!
//! Mirrors what the error-driven cascade's status summary reports: attempt
//! counts, per-tier outcomes and the tier that eventually served the
//! request, for logging and operator visibility rather than programmatic
//! decisions.

use std::time::{Duration, Instant};

use crate::types::ErrorCategory;

/// One tier's outcome during a single `Cascade::generate` call.
#[derive(Debug, Clone)]
pub struct TierAttempt {
    pub tier: String,
    pub error_category: Option<ErrorCategory>,
}

/// Accumulated over one `Cascade::generate` call.
#[derive(Debug, Clone)]
pub struct CascadeStats {
    pub total_attempts: u32,
    pub attempts: Vec<TierAttempt>,
    pub successful_tier: Option<String>,
    started_at: Option<Instant>,
    pub elapsed: Duration,
}

impl Default for CascadeStats {
    fn default() -> Self {
        Self {
            total_attempts: 0,
            attempts: Vec::new(),
            successful_tier: None,
            started_at: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl CascadeStats {
    pub(crate) fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub(crate) fn record_attempt(&mut self, tier: &str, error_category: Option<ErrorCategory>) {
        self.total_attempts += 1;
        self.attempts.push(TierAttempt {
            tier: tier.to_string(),
            error_category,
        });
    }

    pub(crate) fn finish(&mut self, successful_tier: Option<String>) {
        self.successful_tier = successful_tier;
        if let Some(start) = self.started_at {
            self.elapsed = start.elapsed();
        }
    }

    /// Per-tier failure counts, in first-seen order.
    pub fn failures_by_tier(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for attempt in &self.attempts {
            if attempt.tier.as_str() == self.successful_tier.as_deref().unwrap_or_default() {
                continue;
            }
            match counts.iter_mut().find(|(tier, _)| tier == &attempt.tier) {
                Some((_, count)) => *count += 1,
                None => counts.push((attempt.tier.clone(), 1)),
            }
        }
        counts
    }

    /// One-line summary suitable for `tracing::info!` fields.
    pub fn summary(&self) -> String {
        match &self.successful_tier {
            Some(tier) => format!(
                "served by {tier} after {} attempt(s) in {:.2}s",
                self.total_attempts,
                self.elapsed.as_secs_f64()
            ),
            None => format!(
                "exhausted all tiers after {} attempt(s) in {:.2}s",
                self.total_attempts,
                self.elapsed.as_secs_f64()
            ),
        }
    }
}
