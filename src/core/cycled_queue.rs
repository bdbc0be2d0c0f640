use std::collections::VecDeque;

use crate::error::{ChartError, ChartResult};

/// Fixed-capacity ring buffer holding the last `capacity` enqueued values.
///
/// Indexing convention:
/// - `get(0)` is the oldest retained value, `get(len - 1)` the newest
/// - `get(-1)` is the newest value, `get(-len)` the oldest
///
/// Out-of-range reads through [`CycledQueue::get`] return `None`; this is the
/// normal "not enough history yet" case for indicator kernels. Callers that
/// treat such reads as misuse use [`CycledQueue::try_get`] instead.
///
/// Storage grows on demand up to `capacity`; nothing is reserved up front.
#[derive(Debug, Clone, PartialEq)]
pub struct CycledQueue<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> CycledQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::new(),
            capacity,
        }
    }

    /// Pushes `value` to the back.
    ///
    /// Returns the evicted oldest value when the queue was already full, and
    /// `None` otherwise. A zero-capacity queue evicts `value` itself.
    pub fn enqueue(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(value);
        evicted
    }

    /// Removes and returns the oldest value.
    pub fn dequeue(&mut self) -> Option<T> {
        self.buffer.pop_front()
    }

    #[must_use]
    pub fn get(&self, index: isize) -> Option<&T> {
        self.logical_index(index).and_then(|i| self.buffer.get(i))
    }

    pub fn try_get(&self, index: isize) -> ChartResult<&T> {
        self.get(index).ok_or(ChartError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterates from the oldest to the newest value.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.buffer.iter()
    }

    fn logical_index(&self, index: isize) -> Option<usize> {
        let len = self.buffer.len();
        if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            let index = index.unsigned_abs();
            (index < len).then_some(index)
        }
    }
}

impl<T: Copy> CycledQueue<T> {
    /// Copies out the value at `index`, see [`CycledQueue::get`].
    #[must_use]
    pub fn value(&self, index: isize) -> Option<T> {
        self.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::CycledQueue;

    #[test]
    fn logical_index_counts_from_both_ends() {
        let mut queue = CycledQueue::new(3);
        for value in 1..=5 {
            queue.enqueue(value);
        }
        assert_eq!(queue.logical_index(0), Some(0));
        assert_eq!(queue.logical_index(-1), Some(2));
        assert_eq!(queue.logical_index(3), None);
        assert_eq!(queue.logical_index(-4), None);
        assert_eq!(queue.value(0), Some(3));
        assert_eq!(queue.value(-1), Some(5));
    }

    #[test]
    fn dequeue_after_wrap_keeps_order() {
        let mut queue = CycledQueue::new(3);
        for value in 1..=4 {
            queue.enqueue(value);
        }
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
        queue.enqueue(5);
        assert_eq!(queue.enqueue(6), None);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![4, 5, 6]);
        assert_eq!(queue.enqueue(7), Some(4));
    }

    #[test]
    fn huge_capacity_reserves_nothing() {
        let mut queue: CycledQueue<f64> = CycledQueue::new(usize::MAX);
        assert_eq!(queue.enqueue(1.0), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.capacity(), usize::MAX);
    }
}
