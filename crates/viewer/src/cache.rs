//! Bounded frame cache with insertion-order eviction.

use indexmap::IndexMap;
use ppe_core::types::FrameNumber;

/// Default number of frames held.
pub const DEFAULT_CAPACITY: usize = 50;

/// Frame number → decoded image, evicting the oldest *inserted* entry once
/// capacity is exceeded. Reads do not refresh an entry's position.
#[derive(Debug)]
pub struct FrameCache<T> {
    entries: IndexMap<FrameNumber, T>,
    capacity: usize,
}

impl<T> FrameCache<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn get(&self, frame: FrameNumber) -> Option<&T> {
        self.entries.get(&frame)
    }

    pub fn contains(&self, frame: FrameNumber) -> bool {
        self.entries.contains_key(&frame)
    }

    /// Insert a frame. Re-inserting a cached frame replaces the value in
    /// place without moving it to the back of the eviction order.
    pub fn insert(&mut self, frame: FrameNumber, value: T) {
        self.entries.insert(frame, value);
        if self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for FrameCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_inserted_beyond_capacity() {
        let mut cache = FrameCache::default();
        for frame in 1..=51 {
            cache.insert(frame, frame * 10);
        }

        assert_eq!(cache.len(), 50);
        assert!(!cache.contains(1));
        for frame in 2..=51 {
            assert_eq!(cache.get(frame), Some(&(frame * 10)));
        }
    }

    #[test]
    fn reads_do_not_refresh_position() {
        let mut cache = FrameCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        assert_eq!(cache.get(1), Some(&"a"));

        cache.insert(3, "c");
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
    }

    #[test]
    fn reinsert_keeps_original_position() {
        let mut cache = FrameCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(1, "a2");
        assert_eq!(cache.get(1), Some(&"a2"));

        cache.insert(3, "c");
        assert!(!cache.contains(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = FrameCache::new(0);
        cache.insert(1, ());
        cache.insert(2, ());
        assert_eq!(cache.capacity(), 1);
        assert!(cache.contains(2));
        assert!(!cache.contains(1));
    }
}
