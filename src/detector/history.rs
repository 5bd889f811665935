//! Bounded FIFO history buffers.
//!
//! The only state a detector carries between invocations for the same
//! (venue, symbol) pair. Appending past capacity evicts the oldest entry;
//! no other mutation is permitted.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Append a batch in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
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

    /// Oldest-to-newest iteration.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recently appended entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.extend([1, 2, 3, 4, 5]);

        assert_eq!(buffer.len(), 3);
        let items: Vec<i32> = buffer.iter().copied().collect();
        assert_eq!(items, vec![3, 4, 5]);
        assert_eq!(buffer.latest(), Some(&5));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = HistoryBuffer::new(2);
        for i in 0..100 {
            buffer.push(i);
            assert!(buffer.len() <= 2);
        }
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer: HistoryBuffer<i32> = HistoryBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }
}
