//! Bounded collections
//!
//! Every buffer and registry in the controller grows from runtime input, so
//! each one is capped at insertion time:
//! - [`BoundedBuffer`]: FIFO window, the oldest entry is dropped on overflow
//! - [`BoundedMap`]: insertion-ordered map, trimmed back to a low watermark
//!   (oldest first) once it exceeds its capacity

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Fixed-capacity FIFO window
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, returning the evicted oldest entry if the cap was hit
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The last `n` entries, oldest to newest
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }

    /// Remove and return all entries matching the predicate
    pub fn drain_where<F>(&mut self, mut pred: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut kept = VecDeque::with_capacity(self.items.len());
        let mut drained = Vec::new();
        for item in self.items.drain(..) {
            if pred(&item) {
                drained.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        drained
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Insertion-ordered map with watermark eviction
///
/// Re-inserting an existing key replaces the value and moves the key to the
/// newest position.
#[derive(Debug, Clone)]
pub struct BoundedMap<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
    low_watermark: usize,
}

impl<K: Eq + Hash + Clone, V> BoundedMap<K, V> {
    /// Create a map that trims back to `low_watermark` entries whenever it
    /// grows past `capacity`. The watermark is clamped to `capacity`.
    pub fn new(capacity: usize, low_watermark: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            low_watermark: low_watermark.min(capacity),
        }
    }

    /// Map whose overflow evicts exactly one entry
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, capacity)
    }

    /// Insert or replace a value, returning the keys evicted by the insertion
    pub fn insert(&mut self, key: K, value: V) -> Vec<K> {
        if self.entries.insert(key.clone(), value).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key);

        let mut evicted = Vec::new();
        if self.entries.len() > self.capacity {
            while self.entries.len() > self.low_watermark {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                        evicted.push(oldest);
                    }
                    None => break,
                }
            }
        }
        evicted
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate in insertion order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get_key_value(k))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}
