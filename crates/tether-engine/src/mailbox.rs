//! Single-slot, latest-wins handoff of policy snapshots.
//!
//! Unlike the [`ExperienceChannel`](crate::ExperienceChannel), the mailbox
//! never queues: publishing overwrites any snapshot the consumer has not
//! taken yet. The control loop therefore never applies a stale policy
//! once a newer one exists, and never waits for one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_core::Policy;

/// A single shared slot holding at most the latest published snapshot.
///
/// Generic over the snapshot type; defaults to `dyn Policy`.
pub struct PolicyMailbox<P: ?Sized = dyn Policy> {
    slot: Mutex<Option<Arc<P>>>,
    published: AtomicU64,
    overwritten: AtomicU64,
}

// Compile-time assertion: the default mailbox must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<PolicyMailbox>();
};

impl<P: ?Sized> PolicyMailbox<P> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            published: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Deposit `policy`, discarding any undelivered previous one.
    ///
    /// Returns `true` if an undelivered snapshot was overwritten.
    pub fn publish(&self, policy: Arc<P>) -> bool {
        let previous = self.lock().replace(policy);
        self.published.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Whether a snapshot is waiting. Never blocks on availability.
    pub fn is_available(&self) -> bool {
        self.lock().is_some()
    }

    /// Atomically take the waiting snapshot, leaving the slot empty.
    /// Returns `None` when nothing is waiting.
    pub fn take_if_available(&self) -> Option<Arc<P>> {
        self.lock().take()
    }

    /// Total number of [`publish`](Self::publish) calls.
    pub fn published_total(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of snapshots discarded before delivery.
    pub fn overwritten_total(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<P>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: ?Sized> Default for PolicyMailbox<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized> fmt::Debug for PolicyMailbox<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyMailbox")
            .field("available", &self.is_available())
            .field("published_total", &self.published_total())
            .field("overwritten_total", &self.overwritten_total())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tether_core::{ActionId, StateId, TablePolicy};

    fn constant(action: u32) -> Arc<dyn Policy> {
        Arc::new(move |_s: StateId| Some(ActionId(action)))
    }

    #[test]
    fn empty_mailbox_yields_none() {
        let mb: PolicyMailbox = PolicyMailbox::new();
        assert!(!mb.is_available());
        assert!(mb.take_if_available().is_none());
    }

    #[test]
    fn latest_publish_wins() {
        let mb: PolicyMailbox = PolicyMailbox::new();
        assert!(!mb.publish(constant(1)));
        assert!(mb.publish(constant(2)));
        assert!(mb.is_available());

        let taken = mb.take_if_available().unwrap();
        assert_eq!(taken.action_for(StateId(0)), Some(ActionId(2)));
        assert!(mb.take_if_available().is_none());
        assert_eq!(mb.published_total(), 2);
        assert_eq!(mb.overwritten_total(), 1);
    }

    #[test]
    fn works_with_concrete_snapshot_types() {
        let mb: PolicyMailbox<TablePolicy> = PolicyMailbox::new();
        let mut table = TablePolicy::new();
        table.insert(StateId(1), ActionId(1));
        mb.publish(Arc::new(table.clone()));
        assert_eq!(*mb.take_if_available().unwrap(), table);
    }

    #[test]
    fn concurrent_publishers_leave_one_snapshot() {
        let mb: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let mb = Arc::clone(&mb);
                thread::spawn(move || {
                    for i in 0..100 {
                        mb.publish(constant(t * 1000 + i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(mb.published_total(), 400);
        assert!(mb.take_if_available().is_some());
        assert!(mb.take_if_available().is_none());
        assert_eq!(mb.overwritten_total(), 399);
    }
}
