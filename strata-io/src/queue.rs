//! A fixed-capacity, blocking, single-producer/single-consumer FIFO queue.
//!
//! This replaces the hand-rolled pthread mutex/condvar ring buffer the
//! original carving engine used to hand buffers between its reader and
//! search threads: ownership passes through the queue, never through a
//! shared pointer, so at most one side ever holds a given element.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

/// Blocking bounded queue. `put` blocks while full, `get` blocks while empty.
/// Strict FIFO arrival order; no priority.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be nonzero");
        BoundedQueue {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Push an element, blocking while the queue is at capacity.
    pub fn put(&self, elem: T) {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        while guard.buf.len() == guard.capacity {
            guard = self.not_full.wait(guard).expect("queue mutex poisoned");
        }
        guard.buf.push_back(elem);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Pop the oldest element, blocking while the queue is empty.
    pub fn get(&self) -> T {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        while guard.buf.is_empty() {
            guard = self.not_empty.wait(guard).expect("queue mutex poisoned");
        }
        let elem = guard.buf.pop_front().expect("checked non-empty above");
        drop(guard);
        self.not_full.notify_one();
        elem
    }

    /// Current number of queued elements. Racy by nature; intended for
    /// diagnostics/logging only.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_preserved() {
        let q: BoundedQueue<i32> = BoundedQueue::new(4);
        q.put(1);
        q.put(2);
        q.put(3);
        assert_eq!(q.get(), 1);
        assert_eq!(q.get(), 2);
        assert_eq!(q.get(), 3);
    }

    #[test]
    fn put_blocks_until_consumer_drains() {
        let q = Arc::new(BoundedQueue::new(1));
        q.put(1);

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.put(2);
        });

        // Give the producer a moment to actually block on a full queue.
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(q.len(), 1);

        assert_eq!(q.get(), 1);
        handle.join().unwrap();
        assert_eq!(q.get(), 2);
    }

    #[test]
    fn get_blocks_until_producer_arrives() {
        let q = Arc::new(BoundedQueue::new(2));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.get());

        thread::sleep(std::time::Duration::from_millis(20));
        q.put(42);
        assert_eq!(handle.join().unwrap(), 42);
    }
}
