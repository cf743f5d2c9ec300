//! Arrival Sequencer
//!
//! Received packets come off the channel out of order and from several
//! receive paths at once. The sequencer keeps them in one total order:
//! by timestamp, then by identity. Insertion locates its slot by binary
//! search and shifts the tail, which is cheap next to channel throughput.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::config::SequencerConfig;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Ordering Relation
// ----------------------------------------------------------------------------

/// An item that can be placed in the arrival sequence
///
/// The identity only breaks timestamp ties, but it must be totally ordered
/// and unique per item for the sequence to be independent of arrival order.
pub trait Sequenced {
    type Identity: Ord;

    fn timestamp(&self) -> Timestamp;

    fn identity(&self) -> &Self::Identity;
}

impl<I: Ord> Sequenced for (Timestamp, I) {
    type Identity = I;

    fn timestamp(&self) -> Timestamp {
        self.0
    }

    fn identity(&self) -> &I {
        &self.1
    }
}

impl<T: Sequenced + ?Sized> Sequenced for &T {
    type Identity = T::Identity;

    fn timestamp(&self) -> Timestamp {
        (**self).timestamp()
    }

    fn identity(&self) -> &T::Identity {
        (**self).identity()
    }
}

impl<T: Sequenced + ?Sized> Sequenced for Arc<T> {
    type Identity = T::Identity;

    fn timestamp(&self) -> Timestamp {
        (**self).timestamp()
    }

    fn identity(&self) -> &T::Identity {
        (**self).identity()
    }
}

/// Compare two items by timestamp, then identity
pub fn arrival_order<T: Sequenced>(a: &T, b: &T) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| a.identity().cmp(b.identity()))
}

/// Strict "comes before" relation
pub fn precedes<T: Sequenced>(a: &T, b: &T) -> bool {
    arrival_order(a, b) == Ordering::Less
}

/// Leftmost index at which `item` keeps `sequence` sorted
///
/// `sequence` must already be sorted under [`precedes`]. An item equal to
/// existing entries is placed before them.
pub fn insertion_index<T: Sequenced>(item: &T, sequence: &[T]) -> usize {
    sequence.partition_point(|existing| precedes(existing, item))
}

/// Insert `item` at its ordered position and return that position
pub fn insert<T: Sequenced>(item: T, sequence: &mut Vec<T>) -> usize {
    let index = insertion_index(&item, sequence);
    sequence.insert(index, item);
    index
}

// ----------------------------------------------------------------------------
// Arrival Sequencer
// ----------------------------------------------------------------------------

/// Maintained, always-sorted sequence of received items
///
/// Items are not deduplicated. With a retention limit the oldest items are
/// dropped once the limit is exceeded.
#[derive(Debug, Clone)]
pub struct ArrivalSequencer<T> {
    items: Vec<T>,
    max_items: Option<usize>,
}

impl<T: Sequenced> ArrivalSequencer<T> {
    /// Create an unbounded sequencer
    pub fn new() -> Self {
        Self::with_config(SequencerConfig::default())
    }

    pub fn with_config(config: SequencerConfig) -> Self {
        Self {
            items: Vec::new(),
            max_items: config.max_items,
        }
    }

    /// Where `item` would be inserted
    pub fn insertion_index(&self, item: &T) -> usize {
        insertion_index(item, &self.items)
    }

    /// Insert an item and return its final position
    ///
    /// Returns `None` when retention evicted the item straight away because
    /// it was older than everything kept.
    pub fn insert(&mut self, item: T) -> Option<usize> {
        let index = insert(item, &mut self.items);
        let evicted = self.enforce_retention();
        index.checked_sub(evicted)
    }

    /// Insert every item from `items`
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            insert(item, &mut self.items);
        }
        self.enforce_retention();
    }

    fn enforce_retention(&mut self) -> usize {
        match self.max_items {
            Some(max) if self.items.len() > max => {
                let excess = self.items.len() - max;
                self.items.drain(..excess);
                excess
            }
            _ => 0,
        }
    }

    /// Items at or after `since`
    pub fn since(&self, since: Timestamp) -> &[T] {
        let start = self.items.partition_point(|item| item.timestamp() < since);
        &self.items[start..]
    }

    /// Whether an item with the same timestamp and identity is present
    pub fn contains(&self, item: &T) -> bool {
        self.items
            .binary_search_by(|existing| arrival_order(existing, item))
            .is_ok()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Sequenced> Default for ArrivalSequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a ArrivalSequencer<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
