//! The policy side channel.
//!
//! Policy tables travel on their own transport, separate from the
//! percept/action exchange. The host writes `POLICY_UPDATE` frames with
//! a [`PolicySender`]; on the device a [`PolicyFeed`] thread reads them
//! and publishes each table into a local [`PolicyMailbox`], where the
//! control loop picks it up without ever waiting on the link.
//!
//! The device can end the feed on its own with
//! [`PolicyFeedHandle::shutdown`], even while the host keeps the side
//! channel open.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use tether_core::{ConfigError, LinkError, TablePolicy};
use tether_engine::PolicyMailbox;

use crate::codec::{self, Opcode};
use crate::transport::{Interrupter, Interruptible, Transport};

// ── PolicySender ────────────────────────────────────────────────

/// Host-side writer for the policy side channel.
pub struct PolicySender<T> {
    transport: T,
    sent: u64,
    open: bool,
}

impl<T: Transport> PolicySender<T> {
    /// Write policy updates to `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sent: 0,
            open: true,
        }
    }

    /// Push `table` to the device.
    pub fn send(&mut self, table: &TablePolicy) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::Disconnected);
        }
        self.transport.send(&codec::encode_policy_update(table)?)?;
        self.sent += 1;
        debug!(entries = table.len(), sent = self.sent, "policy update sent");
        Ok(())
    }

    /// Number of updates sent.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Send `DISCONNECT` and close. Idempotent.
    pub fn close(&mut self) -> Result<(), LinkError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let sent = self.transport.send(&codec::encode_disconnect());
        let closed = self.transport.close();
        sent.and(closed)
    }
}

impl<T> fmt::Debug for PolicySender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySender")
            .field("sent", &self.sent)
            .field("open", &self.open)
            .finish()
    }
}

// ── PolicyFeed ──────────────────────────────────────────────────

/// Counters from a finished feed thread.
#[derive(Debug)]
pub struct FeedReport {
    /// Tables received and published.
    pub received: u64,
    /// Published tables that overwrote an undelivered one.
    pub superseded: u64,
    /// Whether the host ended the feed with `DISCONNECT`.
    pub clean_disconnect: bool,
    /// Whether the device ended the feed through its handle.
    pub stopped: bool,
    /// The error that ended the feed, if it was not a disconnect.
    pub error: Option<LinkError>,
}

/// Entry point for spawning the device-side feed thread.
pub struct PolicyFeed;

impl PolicyFeed {
    /// Read policy updates from `transport` on a thread named
    /// `tether-policy-feed`, publishing each one to `mailbox`.
    ///
    /// The thread runs until the host disconnects, the transport fails,
    /// or the handle shuts it down.
    ///
    /// # Errors
    ///
    /// The transport's interrupter error, or [`LinkError::Config`]
    /// wrapping [`ConfigError::ThreadSpawnFailed`].
    pub fn spawn<T: Interruptible + 'static>(
        transport: T,
        mailbox: Arc<PolicyMailbox>,
    ) -> Result<PolicyFeedHandle, LinkError> {
        let interrupter = transport.interrupter()?;
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("tether-policy-feed".into())
            .spawn(move || run_feed(transport, &mailbox, &thread_stop))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("policy feed: {e}"),
            })?;
        Ok(PolicyFeedHandle {
            thread: Some(thread),
            interrupter,
            stop,
        })
    }
}

/// Owner of a running feed thread.
///
/// Dropping the handle shuts the feed down.
pub struct PolicyFeedHandle {
    thread: Option<JoinHandle<FeedReport>>,
    interrupter: Interrupter,
    stop: Arc<AtomicBool>,
}

impl PolicyFeedHandle {
    /// Whether the feed thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the host to end the feed. Returns `None` if the thread
    /// panicked.
    pub fn join(mut self) -> Option<FeedReport> {
        self.wait()
    }

    /// Stop reading, release the transport, and join the thread. Works
    /// whether or not the host is still connected.
    ///
    /// Returns `None` if the thread panicked.
    pub fn shutdown(mut self) -> Option<FeedReport> {
        self.stop_and_wait()
    }

    fn stop_and_wait(&mut self) -> Option<FeedReport> {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.interrupter.interrupt() {
            warn!(error = %e, "interrupting policy feed failed");
        }
        self.wait()
    }

    fn wait(&mut self) -> Option<FeedReport> {
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("policy feed thread panicked");
                None
            }
        }
    }
}

impl Drop for PolicyFeedHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.stop_and_wait();
        }
    }
}

impl fmt::Debug for PolicyFeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyFeedHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn run_feed<T: Transport>(
    mut transport: T,
    mailbox: &PolicyMailbox,
    stop: &AtomicBool,
) -> FeedReport {
    info!("policy feed starting");
    let mut report = FeedReport {
        received: 0,
        superseded: 0,
        clean_disconnect: false,
        stopped: false,
        error: None,
    };
    loop {
        let frame = codec::read_opcode(&mut transport).and_then(|op| match op {
            Opcode::PolicyUpdate => codec::read_policy_body(&mut transport).map(Some),
            Opcode::Disconnect => Ok(None),
            Opcode::SendPerceptReceiveAction => Err(LinkError::MalformedFrame {
                detail: "percept on the policy side channel".into(),
            }),
        });
        match frame {
            Ok(Some(table)) => {
                report.received += 1;
                debug!(entries = table.len(), received = report.received, "policy received");
                if mailbox.publish(Arc::new(table)) {
                    report.superseded += 1;
                }
            }
            Ok(None) => {
                report.clean_disconnect = true;
                break;
            }
            Err(e) if e.is_disconnect() || stop.load(Ordering::Acquire) => {
                report.stopped = stop.load(Ordering::Acquire);
                break;
            }
            Err(e) => {
                warn!(error = %e, "policy feed failed");
                report.error = Some(e);
                break;
            }
        }
    }
    let _ = transport.close();
    info!(received = report.received, "policy feed finished");
    report
}
