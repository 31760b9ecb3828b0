//! Fixed-capacity FIFO with oldest-first eviction.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BoundedDeque<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedDeque<T> {
    /// A capacity of zero is bumped to one.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append `value`, returning the evicted oldest entry when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.buf.len() >= self.cap {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        debug_assert!(self.buf.len() <= self.cap);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn back(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.buf.iter()
    }
}

impl<'a, T> IntoIterator for &'a BoundedDeque<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut q = BoundedDeque::with_capacity(3);
        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), None);
        assert_eq!(q.push(4), Some(1));
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut q = BoundedDeque::with_capacity(0);
        q.push('a');
        q.push('b');
        assert_eq!(q.len(), 1);
        assert_eq!(q.back(), Some(&'b'));
    }
}
