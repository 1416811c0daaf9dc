//! Strategy B: error-driven cascade ordering (spec §4.2).
//!
//! Doesn't preemptively check rate limits — tries tiers in priority order
//! and only reacts to failures. A tier that errors is demoted to a FIFO
//! failed queue and retried after `retry_after_attempts` cascade attempts
//! have elapsed since its failure; a successful retry moves it back to
//! the top of the active list.

use std::collections::VecDeque;
use std::sync::Mutex;

struct FailedEntry {
    tier: String,
    failed_at_attempt: u64,
    num_failures: u32,
}

struct Inner {
    active: Vec<String>,
    failed: VecDeque<FailedEntry>,
    total_attempts: u64,
    /// The entry pulled off `failed` for its retry attempt, held here
    /// (rather than discarded) so a failed retry can be pushed back with
    /// its prior `num_failures` intact instead of resetting to 1.
    retrying: Option<FailedEntry>,
}

/// Current cascade state, for logging/reporting (spec §4.2.5).
#[derive(Debug, Clone)]
pub struct CascadeStatus {
    pub total_attempts: u64,
    pub active: Vec<String>,
    pub failed: Vec<(String, u32, u64)>,
    pub retry_in_progress: Option<String>,
}

/// Error-driven cascade over an ordered list of tier names.
pub struct ErrorDrivenCascade {
    inner: Mutex<Inner>,
    retry_after_attempts: u64,
}

impl ErrorDrivenCascade {
    pub fn new(tiers: Vec<String>, retry_after_attempts: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: tiers,
                failed: VecDeque::new(),
                total_attempts: 0,
                retrying: None,
            }),
            retry_after_attempts,
        }
    }

    /// Get the next tier to try, promoting a failed tier off the FIFO
    /// queue once enough attempts have passed since its last failure.
    pub fn next_tier(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.total_attempts += 1;
        let total_attempts = inner.total_attempts;
        let retry_after = self.retry_after_attempts;

        if let Some(pos) = inner
            .failed
            .iter()
            .position(|e| total_attempts - e.failed_at_attempt >= retry_after)
        {
            let entry = inner.failed.remove(pos).unwrap();
            tracing::info!(
                tier = %entry.tier,
                num_failures = entry.num_failures,
                "retrying tier from failed queue"
            );
            let tier = entry.tier.clone();
            inner.retrying = Some(entry);
            return Some(tier);
        }

        if let Some(tier) = inner.active.first().cloned() {
            return Some(tier);
        }

        tracing::error!("no tiers available, all have failed");
        None
    }

    /// Record that `tier` succeeded, moving it to the top of the active list.
    pub fn mark_success(&self, tier: &str) {
        let mut inner = self.inner.lock().unwrap();

        if inner.retrying.as_ref().is_some_and(|e| e.tier == tier) {
            tracing::info!(tier, "retry succeeded, tier is working again");
            inner.retrying = None;
        }

        inner.failed.retain(|e| e.tier != tier);
        inner.active.retain(|t| t != tier);
        inner.active.insert(0, tier.to_string());
    }

    /// Record that `tier` failed, demoting it to the failed queue.
    pub fn mark_failure(&self, tier: &str) {
        let mut inner = self.inner.lock().unwrap();
        let total_attempts = inner.total_attempts;

        let resumed_retry = if inner.retrying.as_ref().is_some_and(|e| e.tier == tier) {
            tracing::info!(tier, "retry failed, moving back to failed queue");
            inner.retrying.take()
        } else {
            None
        };

        inner.active.retain(|t| t != tier);

        if let Some(entry) = inner.failed.iter_mut().find(|e| e.tier == tier) {
            entry.failed_at_attempt = total_attempts;
            entry.num_failures += 1;
        } else if let Some(mut entry) = resumed_retry {
            entry.failed_at_attempt = total_attempts;
            entry.num_failures += 1;
            inner.failed.push_back(entry);
        } else {
            tracing::info!(
                tier,
                retry_after = self.retry_after_attempts,
                "tier failed, demoting to failed queue"
            );
            inner.failed.push_back(FailedEntry {
                tier: tier.to_string(),
                failed_at_attempt: total_attempts,
                num_failures: 1,
            });
        }
    }

    pub fn status(&self) -> CascadeStatus {
        let inner = self.inner.lock().unwrap();
        CascadeStatus {
            total_attempts: inner.total_attempts,
            active: inner.active.clone(),
            failed: inner
                .failed
                .iter()
                .map(|e| (e.tier.clone(), e.num_failures, e.failed_at_attempt))
                .collect(),
            retry_in_progress: inner.retrying.as_ref().map(|e| e.tier.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cascade() -> ErrorDrivenCascade {
        ErrorDrivenCascade::new(vec!["a".into(), "b".into(), "c".into()], 5)
    }

    #[test]
    fn tries_active_models_in_order() {
        let cascade = cascade();
        assert_eq!(cascade.next_tier(), Some("a".to_string()));
    }

    #[test]
    fn failure_demotes_to_failed_queue() {
        let cascade = cascade();
        cascade.next_tier();
        cascade.mark_failure("a");
        assert_eq!(cascade.next_tier(), Some("b".to_string()));
        assert_eq!(cascade.status().failed.len(), 1);
    }

    #[test]
    fn success_promotes_to_top_of_active() {
        let cascade = cascade();
        cascade.next_tier();
        cascade.mark_success("c");
        assert_eq!(cascade.next_tier(), Some("c".to_string()));
    }

    #[test]
    fn failed_tier_retried_after_k_attempts() {
        let cascade = ErrorDrivenCascade::new(vec!["a".into(), "b".into()], 3);
        cascade.next_tier(); // attempt 1, returns a
        cascade.mark_failure("a");

        cascade.next_tier(); // attempt 2: b
        cascade.next_tier(); // attempt 3: b
        let fourth = cascade.next_tier(); // attempt 4: still within window (4-1=3 >= 3)
        assert_eq!(fourth, Some("a".to_string()));
    }

    #[test]
    fn repeated_failures_count_up() {
        let cascade = cascade();
        cascade.next_tier();
        cascade.mark_failure("a");
        cascade.mark_failure("a");
        assert_eq!(cascade.status().failed[0].1, 2);
    }

    #[test]
    fn failure_count_survives_a_failed_retry() {
        let cascade = ErrorDrivenCascade::new(vec!["a".into(), "b".into()], 2);
        cascade.next_tier(); // attempt 1: a
        cascade.mark_failure("a"); // num_failures = 1

        cascade.next_tier(); // attempt 2: b
        let retried = cascade.next_tier(); // attempt 3: retry window open, pulls a back
        assert_eq!(retried, Some("a".to_string()));

        cascade.mark_failure("a"); // retry failed again
        assert_eq!(cascade.status().failed[0].1, 2);
    }
}
