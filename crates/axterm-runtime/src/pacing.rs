//! Concurrent per-destination pacing
//!
//! Wraps the core token bucket in a sharded map so senders on different
//! threads or tasks can share one registry. Every operation on a destination
//! runs while holding that destination's shard lock, which makes
//! refill-decide-deduct atomic and guarantees at most one bucket is created
//! per destination even when the first references race.

use std::time::Duration;

use axterm_core::{DestinationId, PacingStats, RateLimitConfig, Timestamp, TokenBucket};
use dashmap::DashMap;
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Shared Bucket Registry
// ----------------------------------------------------------------------------

/// Thread-safe bucket registry
#[derive(Debug)]
pub struct SharedBucketRegistry {
    config: RateLimitConfig,
    buckets: DashMap<DestinationId, TokenBucket>,
}

impl SharedBucketRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Run `f` against `destination`'s bucket under its lock, creating it if needed
    fn with_bucket<R>(
        &self,
        destination: &DestinationId,
        now: Timestamp,
        f: impl FnOnce(&mut TokenBucket) -> R,
    ) -> R {
        if let Some(mut bucket) = self.buckets.get_mut(destination) {
            return f(bucket.value_mut());
        }
        let mut bucket = self
            .buckets
            .entry(destination.clone())
            .or_insert_with(|| {
                debug!(destination = %destination, "creating token bucket");
                TokenBucket::new(self.config, now)
            });
        f(bucket.value_mut())
    }

    /// Ask whether `cost` bytes may be sent to `destination` now
    pub fn admit(&self, destination: &DestinationId, cost: f64, now: Timestamp) -> bool {
        let granted = self.with_bucket(destination, now, |bucket| bucket.allow(cost, now));
        if granted {
            trace!(destination = %destination, cost, "admission granted");
        } else {
            debug!(destination = %destination, cost, "admission denied");
        }
        granted
    }

    pub fn available(&self, destination: &DestinationId, now: Timestamp) -> f64 {
        self.with_bucket(destination, now, |bucket| bucket.available(now))
    }

    pub fn time_until_available(
        &self,
        destination: &DestinationId,
        cost: f64,
        now: Timestamp,
    ) -> Duration {
        self.with_bucket(destination, now, |bucket| {
            bucket.time_until_available(cost, now)
        })
    }

    /// Refill one destination's bucket; unknown destinations are left alone
    pub fn reset_bucket(&self, destination: &DestinationId, now: Timestamp) {
        if let Some(mut bucket) = self.buckets.get_mut(destination) {
            bucket.reset(now);
            debug!(destination = %destination, "bucket reset");
        }
    }

    /// Discard every bucket
    pub fn clear_all_buckets(&self) {
        let dropped = self.buckets.len();
        self.buckets.clear();
        debug!(dropped, "all buckets cleared");
    }

    /// Drop buckets that have refilled to capacity
    pub fn prune_full(&self, now: Timestamp) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.available(now) < bucket.capacity());
        before.saturating_sub(self.buckets.len())
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
    pub fn stats(&self, now: Timestamp) -> PacingStats {
        let mut tracked = 0;
        let mut depleted = 0;
        for mut bucket in self.buckets.iter_mut() {
            tracked += 1;
            if bucket.available(now) < 1.0 {
                depleted += 1;
            }
        }
        PacingStats {
            tracked_destinations: tracked,
            depleted_destinations: depleted,
            config: self.config,
        }
    }
}

impl Default for SharedBucketRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn create_test_destination(id: u8) -> DestinationId {
        DestinationId::new(format!("N0CALL-{}", id))
    }

    #[test]
    fn test_concurrent_admission_never_over_admits() {
        let registry = SharedBucketRegistry::new(RateLimitConfig::new(0.001, 100.0));
        let destination = create_test_destination(1);
        let granted = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        if registry.admit(&destination, 1.0, Timestamp::ZERO) {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(granted.load(Ordering::SeqCst), 100);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_destinations_paced_independently() {
        let registry = SharedBucketRegistry::new(RateLimitConfig::new(2.0, 10.0));
        let a = create_test_destination(1);
        let b = create_test_destination(2);

        assert!(registry.admit(&a, 10.0, Timestamp::ZERO));
        assert!(!registry.admit(&a, 1.0, Timestamp::ZERO));
        assert_eq!(registry.available(&b, Timestamp::ZERO), 10.0);
        assert_eq!(
            registry.time_until_available(&a, 1.0, Timestamp::ZERO),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_reset_and_clear() {
        let registry = SharedBucketRegistry::new(RateLimitConfig::new(2.0, 10.0));
        let dest = create_test_destination(3);

        registry.reset_bucket(&dest, Timestamp::ZERO);
        assert!(registry.is_empty());

        assert!(registry.admit(&dest, 10.0, Timestamp::ZERO));
        registry.reset_bucket(&dest, Timestamp::ZERO);
        assert_eq!(registry.available(&dest, Timestamp::ZERO), 10.0);

        registry.clear_all_buckets();
        assert!(!registry.contains(&dest));
    }

    #[test]
    fn test_prune_and_stats() {
        let registry = SharedBucketRegistry::new(RateLimitConfig::new(2.0, 10.0));
        assert!(registry.admit(&create_test_destination(1), 10.0, Timestamp::ZERO));
        assert!(registry.admit(&create_test_destination(2), 1.0, Timestamp::ZERO));

        let stats = registry.stats(Timestamp::ZERO);
        assert_eq!(stats.tracked_destinations, 2);
        assert_eq!(stats.depleted_destinations, 1);

        assert_eq!(registry.prune_full(Timestamp::new(500)), 1);
        assert_eq!(registry.len(), 1);
    }
}
