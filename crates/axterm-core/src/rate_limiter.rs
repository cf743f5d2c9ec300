//! Per-destination pacing for the shared radio channel
//!
//! A [`TokenBucket`] refills lazily from the caller-supplied `now`, so no
//! background timer is needed and correctness does not depend on how often it
//! is polled. A [`BucketRegistry`] owns one bucket per destination and is the
//! only way buckets are reached; nothing outside it holds a reference to one.
//!
//! Each destination is paced independently. This gives per-destination
//! fairness but does not bound aggregate channel occupancy; a scheduler that
//! needs that sits above the registry.

use alloc::collections::BTreeMap;
use core::time::Duration;

use crate::config::RateLimitConfig;
use crate::types::{DestinationId, Timestamp};

// ----------------------------------------------------------------------------
// Token Bucket
// ----------------------------------------------------------------------------

/// Token bucket for one logical sender
///
/// Invariant: `0 <= tokens <= capacity` at every observable point. Tokens only
/// grow through elapsed-time refill and only shrink through a granted
/// [`allow`](Self::allow).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    tokens: f64,
    rate_per_second: f64,
    capacity: f64,
    last_refill: Timestamp,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(config: RateLimitConfig, now: Timestamp) -> Self {
        Self::with_tokens(config, config.capacity, now)
    }

    /// Create a bucket holding `tokens`, clamped into `[0, capacity]`
    pub fn with_tokens(config: RateLimitConfig, tokens: f64, now: Timestamp) -> Self {
        let tokens = if tokens.is_nan() {
            0.0
        } else {
            tokens.clamp(0.0, config.capacity)
        };
        Self {
            tokens,
            rate_per_second: config.rate_per_second,
            capacity: config.capacity,
            last_refill: now,
        }
    }

    /// Add tokens for the time elapsed since the last refill
    ///
    /// A `now` earlier than the last refill counts as zero elapsed time and
    /// leaves `last_refill` where it is.
    fn refill(&mut self, now: Timestamp) {
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.seconds_since(self.last_refill);
        self.tokens = (self.tokens + elapsed * self.rate_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then grant and deduct `cost` if enough tokens are present
    ///
    /// Negative or NaN costs are never granted.
    pub fn allow(&mut self, cost: f64, now: Timestamp) -> bool {
        self.refill(now);
        if !(cost >= 0.0) {
            return false;
        }
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Refill and report the current token count
    pub fn available(&mut self, now: Timestamp) -> f64 {
        self.refill(now);
        self.tokens
    }

    /// Refill and report how long until `cost` would be affordable
    ///
    /// The wait is rounded up to whole milliseconds, the resolution of
    /// [`Timestamp`], so `allow(cost, now + wait)` succeeds if nothing else
    /// spends from the bucket first. This is a cooperative backoff hint;
    /// channel conditions may change before it elapses. Costs above capacity
    /// get the formula's answer even though they can never be granted.
    pub fn time_until_available(&mut self, cost: f64, now: Timestamp) -> Duration {
        self.refill(now);
        if self.tokens >= cost {
            return Duration::ZERO;
        }
        let millis = ((cost - self.tokens) / self.rate_per_second * 1000.0).ceil();
        if !(millis < u64::MAX as f64) {
            return Duration::MAX;
        }
        let mut millis = millis as u64;
        // Float rounding can leave the refilled amount an ulp short
        if cost <= self.capacity {
            for _ in 0..8 {
                if self.refilled_after(millis) >= cost {
                    break;
                }
                millis = millis.saturating_add(1);
            }
        }
        Duration::from_millis(millis)
    }

    /// Tokens a refill would produce after `millis` milliseconds
    fn refilled_after(&self, millis: u64) -> f64 {
        let elapsed = millis as f64 / 1000.0;
        (self.tokens + elapsed * self.rate_per_second).min(self.capacity)
    }

    /// Refill to capacity and restart the refill clock
    pub fn reset(&mut self, now: Timestamp) {
        self.tokens = self.capacity;
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Token count as of the last refill
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    pub fn last_refill(&self) -> Timestamp {
        self.last_refill
    }

    /// Whether the bucket is full as of the last refill
    pub fn is_full(&self) -> bool {
        self.tokens >= self.capacity
    }
}

// ----------------------------------------------------------------------------
// Bucket Registry
// ----------------------------------------------------------------------------

/// One token bucket per destination, created lazily with shared defaults
///
/// Mutation goes through `&mut self`, so a registry value is its own
/// serialization point. Share it across threads through a lock or use the
/// runtime's concurrent registry.
#[derive(Debug, Clone)]
pub struct BucketRegistry {
    config: RateLimitConfig,
    buckets: BTreeMap<DestinationId, TokenBucket>,
}

impl BucketRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a registry with custom bucket defaults
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: BTreeMap::new(),
        }
    }

    fn bucket_mut(&mut self, destination: &DestinationId, now: Timestamp) -> &mut TokenBucket {
        let config = self.config;
        self.buckets.entry(destination.clone()).or_insert_with(|| {
            log::debug!("creating token bucket for {}", destination);
            TokenBucket::new(config, now)
        })
    }

    /// Ask whether `cost` bytes may be sent to `destination` now
    pub fn admit(&mut self, destination: &DestinationId, cost: f64, now: Timestamp) -> bool {
        let granted = self.bucket_mut(destination, now).allow(cost, now);
        log::trace!(
            "admission for {} cost={} granted={}",
            destination,
            cost,
            granted
        );
        granted
    }

    /// Tokens currently available to `destination`
    pub fn available(&mut self, destination: &DestinationId, now: Timestamp) -> f64 {
        self.bucket_mut(destination, now).available(now)
    }

    /// Backoff hint for a denied admission
    pub fn time_until_available(
        &mut self,
        destination: &DestinationId,
        cost: f64,
        now: Timestamp,
    ) -> Duration {
        self.bucket_mut(destination, now)
            .time_until_available(cost, now)
    }

    /// Refill `destination`'s bucket; no-op if it has never been referenced
    pub fn reset(&mut self, destination: &DestinationId, now: Timestamp) {
        if let Some(bucket) = self.buckets.get_mut(destination) {
            bucket.reset(now);
        }
    }

    /// Discard every bucket
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Drop buckets that have refilled to capacity
    ///
    /// A dropped bucket is recreated full on next reference, so this only
    /// reclaims memory. Returns how many were removed.
    pub fn prune_full(&mut self, now: Timestamp) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            bucket.refill(now);
            !bucket.is_full()
        });
        before - self.buckets.len()
    }

    pub fn contains(&self, destination: &DestinationId) -> bool {
        self.buckets.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get statistics about current usage
    pub fn stats(&mut self, now: Timestamp) -> PacingStats {
        let mut depleted = 0;
        for bucket in self.buckets.values_mut() {
            if bucket.available(now) < 1.0 {
                depleted += 1;
            }
        }
        PacingStats {
            tracked_destinations: self.buckets.len(),
            depleted_destinations: depleted,
            config: self.config,
        }
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Pacing Statistics
// ----------------------------------------------------------------------------

/// Snapshot of registry usage
#[derive(Debug, Clone, PartialEq)]
pub struct PacingStats {
    /// Destinations that currently own a bucket
    pub tracked_destinations: usize,
    /// Destinations that cannot afford even a single byte right now
    pub depleted_destinations: usize,
    /// Defaults applied to new buckets
    pub config: RateLimitConfig,
}

impl PacingStats {
    /// Percentage of tracked destinations that are depleted
    pub fn depleted_percent(&self) -> f32 {
        if self.tracked_destinations == 0 {
            0.0
        } else {
            (self.depleted_destinations as f32 / self.tracked_destinations as f32) * 100.0
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
