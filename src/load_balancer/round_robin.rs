// src/load_balancer/round_robin.rs
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared rotation counter. Only the derived index has to be consistent; the
/// raw value is free to wrap and to be overwritten by [`RoundRobinCursor::hint`].
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    counter: AtomicUsize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(value: usize) -> Self {
        Self {
            counter: AtomicUsize::new(value),
        }
    }

    /// Advance the cursor and return the next candidate index in `0..len`.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        let next = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        Some(next % len)
    }

    /// Point the rotation at a known-good index. Concurrent hints race and the
    /// last write wins.
    pub fn hint(&self, index: usize) {
        self.counter.store(index, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_index_rotates() {
        let cursor = RoundRobinCursor::new();
        let seen: Vec<usize> = (0..6).filter_map(|_| cursor.next_index(3)).collect();
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_empty_len() {
        let cursor = RoundRobinCursor::new();
        assert_eq!(cursor.next_index(0), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_wraparound() {
        let cursor = RoundRobinCursor::starting_at(usize::MAX);
        assert_eq!(cursor.next_index(3), Some(0));
        assert_eq!(cursor.next_index(3), Some(1));
    }

    #[test]
    fn test_hint_moves_rotation() {
        let cursor = RoundRobinCursor::new();
        cursor.hint(4);
        assert_eq!(cursor.next_index(6), Some(5));
    }
}
