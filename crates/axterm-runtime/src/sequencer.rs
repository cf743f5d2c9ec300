//! Shared arrival sequencer
//!
//! Several receive paths insert concurrently while display and replay
//! consumers read. Insertion takes the write lock for the whole
//! locate-and-shift, so readers never observe a half-shifted sequence.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axterm_core::{ArrivalSequencer, SequencerConfig, Sequenced, Timestamp};
use tracing::trace;

/// Single-writer, many-reader wrapper around [`ArrivalSequencer`]
#[derive(Debug)]
pub struct SharedSequencer<T> {
    inner: RwLock<ArrivalSequencer<T>>,
}

impl<T: Sequenced> SharedSequencer<T> {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            inner: RwLock::new(ArrivalSequencer::with_config(config)),
        }
    }

    // A panic while holding the lock cannot leave the Vec unsorted (insert is
    // a single Vec::insert), so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, ArrivalSequencer<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ArrivalSequencer<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a received item; see [`ArrivalSequencer::insert`]
    pub fn insert(&self, item: T) -> Option<usize> {
        let position = self.write().insert(item);
        trace!(?position, "sequenced arrival");
        position
    }

    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        self.write().extend(items);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Run `f` against a consistent view of the sequence
    pub fn with_sequence<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(self.read().as_slice())
    }
}

impl<T: Sequenced + Clone> SharedSequencer<T> {
    /// Copy of the whole sequence
    pub fn snapshot(&self) -> Vec<T> {
        self.read().as_slice().to_vec()
    }

    /// Copy of the items at or after `since`
    pub fn since(&self, since: Timestamp) -> Vec<T> {
        self.read().since(since).to_vec()
    }

    pub fn latest(&self) -> Option<T> {
        self.read().latest().cloned()
    }
}

impl<T: Sequenced> Default for SharedSequencer<T> {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axterm_core::precedes;
    use std::thread;

    #[test]
    fn test_concurrent_inserts_stay_sorted() {
        let sequencer: SharedSequencer<(Timestamp, u32)> = SharedSequencer::default();

        thread::scope(|scope| {
            for worker in 0..4u32 {
                let sequencer = &sequencer;
                scope.spawn(move || {
                    for i in 0..100u32 {
                        let id = worker * 1000 + i;
                        sequencer.insert((Timestamp::new(u64::from((i * 7919) % 37)), id));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    sequencer.with_sequence(|items| {
                        assert!(items.windows(2).all(|pair| precedes(&pair[0], &pair[1])));
                    });
                }
            });
        });

        let items = sequencer.snapshot();
        assert_eq!(items.len(), 400);
        assert!(items.windows(2).all(|pair| precedes(&pair[0], &pair[1])));
    }

    #[test]
    fn test_queries() {
        let sequencer = SharedSequencer::new(SequencerConfig::bounded(3));
        sequencer.extend([
            (Timestamp::new(1), "a"),
            (Timestamp::new(4), "d"),
            (Timestamp::new(2), "b"),
            (Timestamp::new(3), "c"),
        ]);

        assert_eq!(sequencer.len(), 3);
        assert_eq!(sequencer.latest(), Some((Timestamp::new(4), "d")));
        assert_eq!(
            sequencer.since(Timestamp::new(3)),
            vec![(Timestamp::new(3), "c"), (Timestamp::new(4), "d")]
        );

        sequencer.clear();
        assert!(sequencer.is_empty());
    }
}
