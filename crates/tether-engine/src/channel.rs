//! Unbounded FIFO carrying experiences from the control loop to the learner.
//!
//! [`ExperienceChannel`] is a `Mutex<VecDeque>` paired with a `Condvar`.
//! Producers never wait beyond the mutex; the consumer either blocks for
//! one item ([`take_one`](ExperienceChannel::take_one)) or atomically
//! drains everything queued ([`drain_all`](ExperienceChannel::drain_all)).
//!
//! The queue is unbounded: the producer rate is bounded by the physical
//! loop rate, and a slow learner only makes the active policy stale.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tether_core::Experience;

/// Returned by [`ExperienceChannel::push`] after the channel was closed.
/// Carries the rejected experience back to the caller.
#[derive(Debug, PartialEq)]
pub struct ChannelClosed(pub Experience);

impl fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "experience channel is closed")
    }
}

impl std::error::Error for ChannelClosed {}

struct ChannelState {
    queue: VecDeque<Experience>,
    closed: bool,
}

/// Thread-safe, ordered, unbounded queue of [`Experience`] records.
///
/// Experiences are delivered in push order. Multiple producers may push
/// concurrently; items are never lost or duplicated.
pub struct ExperienceChannel {
    state: Mutex<ChannelState>,
    ready: Condvar,
    pushed: AtomicU64,
}

// Compile-time assertion: ExperienceChannel must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ExperienceChannel>();
};

impl ExperienceChannel {
    /// Create an empty, open channel.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
            pushed: AtomicU64::new(0),
        }
    }

    /// Enqueue an experience and wake one waiting consumer.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`] if [`close`](Self::close) was called.
    pub fn push(&self, experience: Experience) -> Result<(), ChannelClosed> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(ChannelClosed(experience));
            }
            state.queue.push_back(experience);
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_one();
        Ok(())
    }

    /// Block until an experience is available and remove it.
    ///
    /// Spurious wakeups re-enter the wait. Returns `None` only once the
    /// channel is closed and every queued experience has been taken.
    pub fn take_one(&self) -> Option<Experience> {
        let mut state = self.lock();
        loop {
            if let Some(experience) = state.queue.pop_front() {
                return Some(experience);
            }
            if state.closed {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take_one`](Self::take_one), but gives up after `timeout`.
    pub fn take_one_timeout(&self, timeout: Duration) -> Option<Experience> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(experience) = state.queue.pop_front() {
                return Some(experience);
            }
            if state.closed {
                return None;
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            let (next, _timed_out) = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }

    /// Remove and return every queued experience in push order.
    ///
    /// Never blocks on availability; returns an empty `Vec` when nothing
    /// is queued.
    pub fn drain_all(&self) -> Vec<Experience> {
        let mut state = self.lock();
        Vec::from(std::mem::take(&mut state.queue))
    }

    /// Append every queued experience to `sink`, returning how many were
    /// moved. Reuses the caller's allocation.
    pub fn drain_into(&self, sink: &mut Vec<Experience>) -> usize {
        let mut state = self.lock();
        let n = state.queue.len();
        sink.extend(state.queue.drain(..));
        n
    }

    /// Close the channel: further pushes fail and blocked consumers wake.
    /// Already queued experiences remain available.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of experiences currently queued.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether no experience is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Total number of experiences ever accepted by [`push`](Self::push).
    pub fn pushed_total(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    // No critical section can panic, so a poisoned lock still guards a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExperienceChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExperienceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ExperienceChannel")
            .field("queued", &state.queue.len())
            .field("closed", &state.closed)
            .field("pushed_total", &self.pushed_total())
            .finish()
    }
}
