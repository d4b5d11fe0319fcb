//! The off-device learner loop.
//!
//! Runs a [`Learner`] on a dedicated thread. The thread drains the
//! [`ExperienceChannel`] in batches, feeds them to the learner, and
//! publishes any policy snapshot the learner hands back into the
//! [`PolicyMailbox`]. Update cadence is the learner's decision: returning
//! `None` from `learn()` publishes nothing.
//!
//! Shutdown closes the channel. The thread keeps draining until the
//! channel is empty, so every experience accepted before the close is
//! learned from, then returns the learner to the caller.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use tether_core::{ConfigError, Experience, Policy};

use crate::channel::ExperienceChannel;
use crate::config::{DrainMode, LearnerConfig};
use crate::mailbox::PolicyMailbox;

/// A policy-learning algorithm. The value-update math lives entirely in
/// the implementation.
pub trait Learner: Send + 'static {
    /// Learn from `batch` (in production order). Return a new policy
    /// snapshot when one is worth sharing.
    fn learn(&mut self, batch: &[Experience]) -> Option<Arc<dyn Policy>>;
}

/// Counters from a finished learner thread.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LearnerReport {
    /// Number of `learn()` calls.
    pub batches: u64,
    /// Number of experiences consumed.
    pub experiences: u64,
    /// Number of policies published to the mailbox.
    pub policies_published: u64,
    /// Published policies that overwrote an undelivered one.
    pub policies_superseded: u64,
}

/// Entry point for spawning the learner thread.
pub struct LearnerLoop;

impl LearnerLoop {
    /// Spawn `learner` on a thread named `tether-learner`.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `config` is invalid, or
    /// [`ConfigError::ThreadSpawnFailed`] if the thread cannot start.
    pub fn spawn<L: Learner>(
        learner: L,
        channel: Arc<ExperienceChannel>,
        mailbox: Arc<PolicyMailbox>,
        config: LearnerConfig,
    ) -> Result<LearnerHandle<L>, ConfigError> {
        config.validate()?;
        let thread_channel = Arc::clone(&channel);
        let thread = thread::Builder::new()
            .name("tether-learner".into())
            .spawn(move || run_learner(learner, &thread_channel, &mailbox, &config))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("learner: {e}"),
            })?;
        Ok(LearnerHandle {
            thread: Some(thread),
            channel,
        })
    }
}

/// Owner of a running learner thread.
///
/// Dropping the handle shuts the thread down and discards the learner;
/// call [`shutdown`](Self::shutdown) to get it back.
pub struct LearnerHandle<L> {
    thread: Option<JoinHandle<(L, LearnerReport)>>,
    channel: Arc<ExperienceChannel>,
}

impl<L> LearnerHandle<L> {
    /// Whether the learner thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Close the experience channel, let the thread learn from whatever
    /// is still queued, and join it.
    ///
    /// Returns `None` if the learner panicked.
    pub fn shutdown(mut self) -> Option<(L, LearnerReport)> {
        self.join()
    }

    fn join(&mut self) -> Option<(L, LearnerReport)> {
        self.channel.close();
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("learner thread panicked");
                None
            }
        }
    }
}

impl<L> Drop for LearnerHandle<L> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.join();
        }
    }
}

impl<L> fmt::Debug for LearnerHandle<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnerHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Learner thread body. Exits once the channel is closed and empty.
fn run_learner<L: Learner>(
    mut learner: L,
    channel: &ExperienceChannel,
    mailbox: &PolicyMailbox,
    config: &LearnerConfig,
) -> (L, LearnerReport) {
    info!(mode = ?config.mode, max_batch = config.max_batch, "learner loop starting");
    let mut report = LearnerReport::default();
    let mut batch = Vec::with_capacity(config.max_batch);

    loop {
        match config.mode {
            DrainMode::Blocking => match channel.take_one() {
                Some(first) => {
                    batch.push(first);
                    channel.drain_into(&mut batch);
                }
                None => break,
            },
            DrainMode::Polling { interval } => {
                if channel.drain_into(&mut batch) == 0 {
                    if channel.is_closed() && channel.is_empty() {
                        break;
                    }
                    thread::sleep(interval);
                    continue;
                }
            }
        }

        for chunk in batch.chunks(config.max_batch) {
            report.batches += 1;
            report.experiences += chunk.len() as u64;
            if let Some(policy) = learner.learn(chunk) {
                report.policies_published += 1;
                if mailbox.publish(policy) {
                    report.policies_superseded += 1;
                }
                debug!(
                    published = report.policies_published,
                    experiences = report.experiences,
                    "policy published"
                );
            }
        }
        batch.clear();
    }

    info!(
        batches = report.batches,
        experiences = report.experiences,
        published = report.policies_published,
        "learner loop finished"
    );
    (learner, report)
}
