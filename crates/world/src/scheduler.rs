//! Cooperative idle-time work queue.
//!
//! Scheduling never runs anything: it only records that a chunk has work
//! pending. The owner pops keys when it has idle time. Descheduling removes
//! the pending entry, so descheduled work is never handed out again.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::chunk::ChunkKey;

/// Entries are handed out nearest-first around the focus key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    key: ChunkKey,
    priority: u32, // Lower = sooner (Chebyshev distance from focus)
    ticket: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering: BinaryHeap pops the greatest entry.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.key.cmp(&self.key))
            .then_with(|| other.ticket.cmp(&self.ticket))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deferred per-chunk work, at most one pending entry per key.
#[derive(Debug, Default)]
pub struct IdleQueue {
    heap: BinaryHeap<QueueEntry>,
    /// Ticket of the live entry for each queued key; heap entries with other tickets are stale.
    queued: HashMap<ChunkKey, u64>,
    next_ticket: u64,
    focus: ChunkKey,
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record pending work for `key`. Returns false if work is already pending.
    pub fn schedule(&mut self, key: ChunkKey) -> bool {
        if self.queued.contains_key(&key) {
            return false;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.queued.insert(key, ticket);
        self.heap.push(QueueEntry {
            key,
            priority: key.chebyshev_distance(self.focus),
            ticket,
        });
        true
    }

    /// Drop pending work for `key`. Returns true if something was pending.
    pub fn deschedule(&mut self, key: ChunkKey) -> bool {
        let removed = self.queued.remove(&key).is_some();
        if removed {
            self.compact_if_sparse();
        }
        removed
    }

    /// Next key with live pending work, nearest to the focus first.
    pub fn pop(&mut self) -> Option<ChunkKey> {
        while let Some(entry) = self.heap.pop() {
            if self.queued.get(&entry.key) == Some(&entry.ticket) {
                self.queued.remove(&entry.key);
                return Some(entry.key);
            }
        }
        None
    }

    /// Re-centre priorities on `focus`.
    pub fn set_focus(&mut self, focus: ChunkKey) {
        if focus == self.focus {
            return;
        }
        self.focus = focus;
        self.rebuild();
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.queued.contains_key(&key)
    }

    /// Number of keys with pending work.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    fn compact_if_sparse(&mut self) {
        if self.heap.len() > 2 * self.queued.len() + 16 {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        let focus = self.focus;
        let live: Vec<_> = self
            .heap
            .drain()
            .filter(|entry| self.queued.get(&entry.key) == Some(&entry.ticket))
            .map(|entry| QueueEntry {
                priority: entry.key.chebyshev_distance(focus),
                ..entry
            })
            .collect();
        self.heap.extend(live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_idempotent() {
        let mut queue = IdleQueue::new();
        assert!(queue.schedule(ChunkKey::new(0, 0)));
        assert!(!queue.schedule(ChunkKey::new(0, 0)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pops_nearest_first() {
        let mut queue = IdleQueue::new();
        queue.schedule(ChunkKey::new(5, 5));
        queue.schedule(ChunkKey::new(1, 1));
        queue.schedule(ChunkKey::new(3, -3));

        assert_eq!(queue.pop(), Some(ChunkKey::new(1, 1)));
        assert_eq!(queue.pop(), Some(ChunkKey::new(3, -3)));
        assert_eq!(queue.pop(), Some(ChunkKey::new(5, 5)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn ties_break_by_key() {
        let mut queue = IdleQueue::new();
        queue.schedule(ChunkKey::new(1, 0));
        queue.schedule(ChunkKey::new(-1, 0));
        queue.schedule(ChunkKey::new(0, 1));
        assert_eq!(queue.pop(), Some(ChunkKey::new(-1, 0)));
        assert_eq!(queue.pop(), Some(ChunkKey::new(0, 1)));
        assert_eq!(queue.pop(), Some(ChunkKey::new(1, 0)));
    }

    #[test]
    fn descheduled_work_never_pops() {
        let mut queue = IdleQueue::new();
        queue.schedule(ChunkKey::new(0, 0));
        queue.schedule(ChunkKey::new(2, 0));
        assert!(queue.deschedule(ChunkKey::new(0, 0)));
        assert!(!queue.deschedule(ChunkKey::new(0, 0)));
        assert_eq!(queue.pop(), Some(ChunkKey::new(2, 0)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn reschedule_after_deschedule_pops_once() {
        let mut queue = IdleQueue::new();
        let key = ChunkKey::new(4, 4);
        queue.schedule(key);
        queue.deschedule(key);
        queue.schedule(key);
        assert_eq!(queue.pop(), Some(key));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn focus_change_reorders() {
        let mut queue = IdleQueue::new();
        queue.schedule(ChunkKey::new(5, 5));
        queue.schedule(ChunkKey::new(10, 10));
        queue.set_focus(ChunkKey::new(9, 9));
        assert_eq!(queue.pop(), Some(ChunkKey::new(10, 10)));
    }

    #[test]
    fn many_deschedules_compact_the_heap() {
        let mut queue = IdleQueue::new();
        for x in 0..100 {
            queue.schedule(ChunkKey::new(x, 0));
        }
        for x in 0..99 {
            queue.deschedule(ChunkKey::new(x, 0));
        }
        assert_eq!(queue.len(), 1);
        assert!(queue.heap.len() <= 2 * queue.len() + 16);
        assert_eq!(queue.pop(), Some(ChunkKey::new(99, 0)));
    }
}
