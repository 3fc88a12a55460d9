//! Bounded work buffer.
//!
//! A plain FIFO behind a mutex and condvar, with one addition beyond a
//! textbook blocking queue: a push-wait threshold. Producers push freely;
//! the queue counts inserts since the last satisfied wait and notifies
//! waiters once that count reaches the configured threshold, so a consumer
//! can amortize wakeups by batching several pushes into one drain instead
//! of waking on every single item.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    since_last_wait: usize,
}

/// A bounded, move-only work buffer shared between one producer role and a
/// pool of consumer threads. `T` is typically a small request or
/// push-message struct; values are moved out on drain, never cloned or
/// cast away from `const`, the way the original's C++ did with a
/// `const_cast` workaround.
pub struct WorkBuffer<T> {
    state: Mutex<Inner<T>>,
    condvar: Condvar,
    threshold: usize,
}

impl<T> WorkBuffer<T> {
    /// `threshold` of `0` or `1` behaves like a plain notify-on-every-push
    /// queue; the push-wait batching only kicks in above that.
    pub fn new(threshold: usize) -> Self {
        Self {
            state: Mutex::new(Inner {
                items: VecDeque::new(),
                since_last_wait: 0,
            }),
            condvar: Condvar::new(),
            threshold: threshold.max(1),
        }
    }

    /// Enqueue `value`. Notifies waiters once the since-last-wait counter
    /// reaches the configured threshold.
    pub fn push(&self, value: T) {
        let mut guard = self.state.lock();
        guard.items.push_back(value);
        guard.since_last_wait += 1;
        if guard.since_last_wait >= self.threshold {
            self.condvar.notify_all();
        }
    }

    /// Pop a single item, FIFO order, or `None` if empty. Does not
    /// participate in threshold bookkeeping: threshold tracking is about
    /// *pushes* since the last satisfied wait, not queue depth.
    pub fn pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Atomically swap out every currently-queued item, in FIFO order.
    /// Safe to call on an empty queue (returns an empty `Vec`).
    pub fn drain(&self) -> Vec<T> {
        let mut guard = self.state.lock();
        guard.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until the queue's size already meets the threshold, or an
    /// insert raises the since-last-wait counter to the threshold, or
    /// `timeout` elapses. Returns `true` for the former two, `false` for a
    /// timeout. A satisfied wait resets the since-last-wait counter.
    pub fn wait_until_threshold(&self, timeout: Duration) -> bool {
        let mut guard = self.state.lock();
        if guard.items.len() >= self.threshold || guard.since_last_wait >= self.threshold {
            guard.since_last_wait = 0;
            return true;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let remaining = deadline - now;
            let result = self.condvar.wait_for(&mut guard, remaining);
            if guard.items.len() >= self.threshold || guard.since_last_wait >= self.threshold {
                guard.since_last_wait = 0;
                return true;
            }
            if result.timed_out() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_drain_preserves_fifo_order() {
        let q: WorkBuffer<i32> = WorkBuffer::new(1);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.drain(), vec![1, 2, 3]);
    }

    #[test]
    fn drain_on_empty_queue_is_safe() {
        let q: WorkBuffer<i32> = WorkBuffer::new(4);
        assert_eq!(q.drain(), Vec::<i32>::new());
    }

    #[test]
    fn wait_times_out_below_threshold() {
        let q: WorkBuffer<i32> = WorkBuffer::new(4);
        q.push(1);
        let hit = q.wait_until_threshold(Duration::from_millis(20));
        assert!(!hit);
    }

    #[test]
    fn wait_succeeds_once_threshold_reached() {
        let q: WorkBuffer<i32> = WorkBuffer::new(2);
        q.push(1);
        q.push(2);
        let hit = q.wait_until_threshold(Duration::from_millis(20));
        assert!(hit);
    }

    #[test]
    fn concurrent_push_wakes_waiter() {
        let q = Arc::new(WorkBuffer::<i32>::new(3));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                q.push(1);
                q.push(2);
                q.push(3);
            })
        };

        let hit = q.wait_until_threshold(Duration::from_millis(500));
        assert!(hit);
        producer.join().unwrap();
    }

    #[test]
    fn pop_returns_none_when_empty() {
        let q: WorkBuffer<i32> = WorkBuffer::new(1);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn threshold_of_zero_behaves_like_one() {
        let q: WorkBuffer<i32> = WorkBuffer::new(0);
        q.push(42);
        assert!(q.wait_until_threshold(Duration::from_millis(20)));
    }

    proptest::proptest! {
        /// For any sequence of pushes, a drain returns exactly that
        /// sequence, in order, regardless of the configured threshold.
        #[test]
        fn drain_returns_pushed_items_in_order(items in proptest::collection::vec(0i32..1000, 0..50), threshold in 1usize..10) {
            let q: WorkBuffer<i32> = WorkBuffer::new(threshold);
            for item in &items {
                q.push(*item);
            }
            proptest::prop_assert_eq!(q.drain(), items);
        }
    }
}
