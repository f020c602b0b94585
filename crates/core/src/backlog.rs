//! A bounded FIFO queue that drops the oldest entry on overflow.
//!
//! Used by the enrichment fetcher's pending-refs backlog and the webhook
//! dispatcher's per-profile send queue. Both favor tactical freshness over
//! completeness, so overflow always drops the oldest entry rather
//! than rejecting the newest.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe bounded queue with drop-oldest overflow behavior.
///
/// All methods take `&self`; the internal lock is a plain [`Mutex`], never
/// held across an `.await` point.
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> DropOldestQueue<T> {
    /// Create a new queue with the given capacity. `capacity == 0` means
    /// every push is immediately dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Push a new item. If the queue is at capacity, the oldest item is
    /// dropped and returned.
    pub fn push(&self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let mut guard = self.items.lock().expect("backlog mutex poisoned");
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front()
        } else {
            None
        };
        guard.push_back(item);
        dropped
    }

    /// Pop the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().expect("backlog mutex poisoned").pop_front()
    }

    /// Requeue an item at the head (to be popped next), used when a fetch
    /// fails with a retryable error and should be retried ahead of the rest
    /// of the backlog. If this push overflows capacity, the newly-requeued
    /// item itself is dropped rather than displacing fresher entries.
    pub fn push_front(&self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let mut guard = self.items.lock().expect("backlog mutex poisoned");
        if guard.len() >= self.capacity {
            return Some(item);
        }
        guard.push_front(item);
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().expect("backlog mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Find the first item matching `predicate` and mutate it in place via
    /// `f`, without changing its position in the queue. Returns `true` if a
    /// match was found. Used to upgrade a still-queued item's payload
    /// instead of requeuing a second one.
    pub fn update_matching<P, F>(&self, predicate: P, f: F) -> bool
    where
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut guard = self.items.lock().expect("backlog mutex poisoned");
        if let Some(item) = guard.iter_mut().find(|item| predicate(item)) {
            f(item);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_under_capacity_drops_nothing() {
        let q = DropOldestQueue::new(3);
        assert!(q.push(1).is_none());
        assert!(q.push(2).is_none());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = DropOldestQueue::new(2);
        assert!(q.push(1).is_none());
        assert!(q.push(2).is_none());
        assert_eq!(q.push(3), Some(1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let q: DropOldestQueue<i32> = DropOldestQueue::new(0);
        assert_eq!(q.push(1), Some(1));
        assert!(q.is_empty());
    }

    #[test]
    fn push_front_is_popped_before_older_tail_items() {
        let q = DropOldestQueue::new(3);
        q.push(1);
        q.push(2);
        assert!(q.push_front(99).is_none());
        assert_eq!(q.pop(), Some(99));
        assert_eq!(q.pop(), Some(1));
    }

    #[test]
    fn update_matching_mutates_in_place_without_reordering() {
        let q = DropOldestQueue::new(3);
        q.push((1, "a"));
        q.push((2, "b"));
        q.push((3, "c"));
        assert!(q.update_matching(|(id, _)| *id == 2, |item| item.1 = "b2"));
        assert_eq!(q.pop(), Some((1, "a")));
        assert_eq!(q.pop(), Some((2, "b2")));
    }

    #[test]
    fn update_matching_returns_false_when_not_found() {
        let q = DropOldestQueue::new(3);
        q.push(1);
        assert!(!q.update_matching(|v| *v == 99, |_| {}));
    }

    #[test]
    fn push_front_drops_self_when_full() {
        let q = DropOldestQueue::new(1);
        q.push(1);
        assert_eq!(q.push_front(2), Some(2));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(1));
    }
}
