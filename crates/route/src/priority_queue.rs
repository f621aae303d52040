//! Indexed priority multiset (§C1).
//!
//! One instance is kept per communication qubit, holding the distance from
//! that communication qubit to every currently-free physical qubit in its
//! core. Grounded on the bucket-map priority queue the router this crate
//! generalizes keeps for the same purpose: a priority → items map plus its
//! inverse, so `add_or_update`/`remove` are O(1) amortized and the minimum
//! is a cached lookup rather than a scan.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;

use hashbrown::HashMap;

/// Priorities here are always finite, non-negative graph distances, so
/// comparing the raw bit pattern of two same-signed finite `f64`s agrees
/// with comparing the floats themselves — this sidesteps pulling in a
/// dedicated ordered-float crate for a single internal use.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Priority(f64);

impl Priority {
    fn new(value: f64) -> Self {
        debug_assert!(
            value.is_finite() && value >= 0.0,
            "priority queue distances must be finite and non-negative, got {value}"
        );
        Priority(value)
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.to_bits().cmp(&other.0.to_bits())
    }
}

#[derive(Debug, Clone)]
pub struct SparseBucketPriorityQueue<T: Copy + Eq + Hash + Ord> {
    buckets: BTreeMap<Priority, BTreeSet<T>>,
    item_to_priority: HashMap<T, Priority>,
}

impl<T: Copy + Eq + Hash + Ord> Default for SparseBucketPriorityQueue<T> {
    fn default() -> Self {
        SparseBucketPriorityQueue {
            buckets: BTreeMap::new(),
            item_to_priority: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash + Ord> SparseBucketPriorityQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_or_update(&mut self, item: T, priority: f64) {
        let priority = Priority::new(priority);
        if let Some(&old) = self.item_to_priority.get(&item) {
            if old == priority {
                return;
            }
            self.remove(item);
        }
        self.buckets.entry(priority).or_default().insert(item);
        self.item_to_priority.insert(item, priority);
    }

    pub fn remove(&mut self, item: T) {
        if let Some(priority) = self.item_to_priority.remove(&item) {
            if let Some(bucket) = self.buckets.get_mut(&priority) {
                bucket.remove(&item);
                if bucket.is_empty() {
                    self.buckets.remove(&priority);
                }
            }
        }
    }

    pub fn contains(&self, item: T) -> bool {
        self.item_to_priority.contains_key(&item)
    }

    /// The lowest-priority item, ties broken by `T`'s own ordering so the
    /// result is deterministic.
    pub fn min(&self) -> Option<T> {
        self.buckets.iter().next().map(|(_, set)| *set.iter().next().unwrap())
    }

    pub fn min_priority(&self) -> Option<f64> {
        self.buckets.keys().next().map(|p| p.0)
    }

    pub fn is_empty(&self) -> bool {
        self.item_to_priority.is_empty()
    }

    pub fn len(&self) -> usize {
        self.item_to_priority.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_minimum_across_updates() {
        let mut q = SparseBucketPriorityQueue::new();
        q.add_or_update(1usize, 3.0);
        q.add_or_update(2usize, 1.0);
        q.add_or_update(3usize, 2.0);
        assert_eq!(q.min(), Some(2));
        assert_eq!(q.min_priority(), Some(1.0));
    }

    #[test]
    fn removing_the_minimum_promotes_next_bucket() {
        let mut q = SparseBucketPriorityQueue::new();
        q.add_or_update(1usize, 3.0);
        q.add_or_update(2usize, 1.0);
        q.remove(2);
        assert_eq!(q.min(), Some(1));
        assert_eq!(q.min_priority(), Some(3.0));
    }

    #[test]
    fn updating_priority_moves_between_buckets() {
        let mut q = SparseBucketPriorityQueue::new();
        q.add_or_update(1usize, 5.0);
        q.add_or_update(1usize, 0.5);
        assert_eq!(q.min_priority(), Some(0.5));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn empty_queue_has_no_minimum() {
        let q: SparseBucketPriorityQueue<usize> = SparseBucketPriorityQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.min(), None);
        assert_eq!(q.min_priority(), None);
    }
}
