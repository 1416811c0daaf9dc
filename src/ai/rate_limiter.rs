//! Strategy A: rate-limit-aware cascade ordering (spec §4.2).
//!
//! Tracks per-tier requests-per-minute/day against a `ModelEntry`'s
//! declared limits and blocks a tier once its budget is exhausted,
//! resuming it automatically after `preferred_tier_retry_secs` or at the
//! next UTC day for daily-quota blocks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use crate::config::ModelEntry;

/// Why a tier is currently blocked from being tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    DailyQuota,
    RateLimited(String),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyQuota => write!(f, "daily quota reached"),
            Self::RateLimited(msg) => write!(f, "rate limited: {}", msg),
        }
    }
}

/// What a caller should do before trying a tier.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    Proceed,
    WaitThenRetry(Duration),
    Blocked(BlockReason),
}

struct Tracker {
    minute_calls: Vec<Instant>,
    day_calls: u32,
    day_start: NaiveDate,
}

impl Tracker {
    fn new() -> Self {
        Self {
            minute_calls: Vec::new(),
            day_calls: 0,
            day_start: Utc::now().date_naive(),
        }
    }

    fn roll_day(&mut self) {
        let today = Utc::now().date_naive();
        if self.day_start != today {
            self.day_calls = 0;
            self.day_start = today;
        }
    }
}

struct Inner {
    trackers: HashMap<String, Tracker>,
    blocks: HashMap<String, (Instant, Duration, BlockReason)>,
}

/// Per-tier rate-limit bookkeeping, shared across worker threads.
pub struct RateLimiter {
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                trackers: HashMap::new(),
                blocks: HashMap::new(),
            }),
        }
    }

    /// Whether `tier` is still blocked, clearing the block if expired.
    pub fn is_blocked(&self, tier: &str) -> Option<BlockReason> {
        let mut inner = self.inner.lock().unwrap();
        match inner.blocks.get(tier) {
            Some((since, duration, reason)) if since.elapsed() < *duration => {
                Some(reason.clone())
            }
            Some(_) => {
                inner.blocks.remove(tier);
                tracing::info!(tier, "tier block expired, eligible for retry");
                None
            }
            None => None,
        }
    }

    /// Check whether `model`'s tier may be called right now. Blocks the
    /// tier and returns `Blocked` if the daily quota is exhausted;
    /// returns `WaitThenRetry` if only the per-minute window is full.
    pub fn check(&self, tier: &str, model: &ModelEntry, retry_secs: u64) -> RateLimitDecision {
        if let Some(reason) = self.is_blocked(tier) {
            return RateLimitDecision::Blocked(reason);
        }

        let mut inner = self.inner.lock().unwrap();
        let tracker = inner
            .trackers
            .entry(tier.to_string())
            .or_insert_with(Tracker::new);
        tracker.roll_day();

        let now = Instant::now();
        tracker
            .minute_calls
            .retain(|t| now.duration_since(*t) < Duration::from_secs(60));

        if tracker.day_calls >= model.requests_per_day {
            inner.blocks.insert(
                tier.to_string(),
                (
                    Instant::now(),
                    Duration::from_secs(retry_secs),
                    BlockReason::DailyQuota,
                ),
            );
            tracing::warn!(tier, retry_secs, "daily quota reached, blocking tier");
            return RateLimitDecision::Blocked(BlockReason::DailyQuota);
        }

        if tracker.minute_calls.len() as u32 >= model.requests_per_minute {
            let oldest = tracker.minute_calls.iter().min().copied().unwrap_or(now);
            let wait = Duration::from_secs(60).saturating_sub(now.duration_since(oldest));
            return RateLimitDecision::WaitThenRetry(wait);
        }

        RateLimitDecision::Proceed
    }

    /// Record a successful call against `tier`'s tracker.
    pub fn record_call(&self, tier: &str) {
        let mut inner = self.inner.lock().unwrap();
        let tracker = inner
            .trackers
            .entry(tier.to_string())
            .or_insert_with(Tracker::new);
        tracker.roll_day();
        tracker.minute_calls.push(Instant::now());
        tracker.day_calls += 1;
    }

    /// Block a tier for `duration`, e.g. after an API-reported 429.
    pub fn block(&self, tier: &str, duration: Duration, reason: BlockReason) {
        tracing::info!(tier, ?duration, %reason, "blocking tier");
        let mut inner = self.inner.lock().unwrap();
        inner
            .blocks
            .insert(tier.to_string(), (Instant::now(), duration, reason));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(rpm: u32, rpd: u32) -> ModelEntry {
        ModelEntry {
            name: "test-model".to_string(),
            provider: "remote".to_string(),
            tier: None,
            api_base: None,
            requests_per_minute: rpm,
            requests_per_day: rpd,
        }
    }

    #[test]
    fn proceeds_within_limits() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.check("t1", &model(15, 1000), 600), RateLimitDecision::Proceed);
    }

    #[test]
    fn minute_limit_requests_wait() {
        let limiter = RateLimiter::new();
        let m = model(2, 1000);
        limiter.record_call("t1");
        limiter.record_call("t1");
        match limiter.check("t1", &m, 600) {
            RateLimitDecision::WaitThenRetry(d) => assert!(d <= Duration::from_secs(60)),
            other => panic!("expected WaitThenRetry, got {:?}", other),
        }
    }

    #[test]
    fn daily_limit_blocks_tier() {
        let limiter = RateLimiter::new();
        let m = model(100, 1);
        limiter.record_call("t1");
        let decision = limiter.check("t1", &m, 600);
        assert_eq!(decision, RateLimitDecision::Blocked(BlockReason::DailyQuota));
        assert!(limiter.is_blocked("t1").is_some());
    }

    #[test]
    fn explicit_block_expires() {
        let limiter = RateLimiter::new();
        limiter.block("t1", Duration::from_millis(10), BlockReason::RateLimited("429".into()));
        assert!(limiter.is_blocked("t1").is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.is_blocked("t1").is_none());
    }
}
