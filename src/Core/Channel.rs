// One-directional FIFO transport between the engine thread and a worker thread.

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::ChannelError;

/// Which way a channel carries messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Engine thread to worker thread.
    Inbound,
    /// Worker thread to engine thread.
    Outbound,
}

/// A thread-safe, unbounded, strictly FIFO queue.
///
/// ### Concurrency Design:
/// - **Send**: takes the queue lock, pushes to the back and wakes one waiter.
///   Never blocks beyond the lock itself.
/// - **Receive**: takes the queue lock and pops from the front, waiting on the
///   condition variable up to the caller's timeout while the queue is empty.
/// - **Probe**: `has_pending` reads a cache-padded counter without touching the
///   lock, so the manager can skip idle threads cheaply. It is best-effort: a
///   concurrent send may not be visible yet.
///
/// Messages are opaque here. The channel only orders them and hands over
/// ownership; a value is owned by exactly one side at any instant.
pub struct Channel<T> {
    pub(crate) direction: Direction,
    pub(crate) queue: Mutex<VecDeque<T>>,
    pub(crate) signal: Condvar,
    /// Number of queued values, mirrored outside the lock for `has_pending`.
    pub(crate) pending: CachePadded<AtomicUsize>,
    /// Total values ever accepted.
    pub(crate) sent: CachePadded<AtomicU64>,
    /// Total values ever handed to the receiver.
    pub(crate) received: CachePadded<AtomicU64>,
    pub(crate) closed: AtomicBool,
    /// Set by `wake`, consumed by the next receive that finds the queue empty.
    pub(crate) woken: AtomicBool,
}

impl<T> Channel<T> {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            queue: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
            pending: CachePadded::new(AtomicUsize::new(0)),
            sent: CachePadded::new(AtomicU64::new(0)),
            received: CachePadded::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
            woken: AtomicBool::new(false),
        }
    }

    /// Enqueue a value. Fails only once the channel has been closed, in which
    /// case the value is handed back to the caller.
    pub fn send(&self, value: T) -> Result<(), ChannelError<T>> {
        let mut queue = self.queue.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed(value));
        }
        queue.push_back(value);
        self.pending.fetch_add(1, Ordering::Release);
        self.sent.fetch_add(1, Ordering::Relaxed);
        drop(queue);

        self.signal.notify_one();
        Ok(())
    }

    /// Dequeue the next value without waiting.
    pub fn try_receive(&self) -> Option<T> {
        let mut queue = self.queue.lock();
        let value = queue.pop_front()?;
        self.pending.fetch_sub(1, Ordering::Release);
        self.received.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Dequeue the next value, waiting up to `timeout` for one to arrive.
    ///
    /// # Returns
    /// * `Some(value)` if a value was queued or arrived in time
    /// * `None` if the timeout elapsed, or the channel was woken with nothing queued
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();

        loop {
            if let Some(value) = queue.pop_front() {
                self.pending.fetch_sub(1, Ordering::Release);
                self.received.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }

            // A wake with nothing queued means the receiver should re-check
            // its state (stop/kill). The flag is read under the lock, so a
            // wake that lands before the wait is not lost.
            if self.closed.load(Ordering::Acquire) || self.woken.swap(false, Ordering::AcqRel) {
                return None;
            }

            if self.signal.wait_until(&mut queue, deadline).timed_out() {
                return None;
            }
        }
    }

    /// Best-effort, lock-free check for queued values.
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Number of values currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of values ever sent.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Total number of values ever received.
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Wake the receiver without sending anything. If it is not waiting yet,
    /// its next receive on an empty queue returns immediately.
    pub fn wake(&self) {
        let _queue = self.queue.lock();
        self.woken.store(true, Ordering::Release);
        self.signal.notify_all();
    }

    /// Refuse further sends. Values already queued stay receivable.
    pub fn close(&self) {
        let _queue = self.queue.lock();
        self.closed.store(true, Ordering::Release);
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove and return everything still queued.
    pub fn drain(&self) -> Vec<T> {
        let mut queue = self.queue.lock();
        let values: Vec<T> = queue.drain(..).collect();
        self.pending.fetch_sub(values.len(), Ordering::Release);
        self.received.fetch_add(values.len() as u64, Ordering::Relaxed);
        values
    }
}
