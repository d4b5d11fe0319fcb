//! Host side of the link.
//!
//! [`LinkServer`] answers one device session: decode each percept,
//! encode it to a state, choose through the host's
//! [`ExplorationPolicy`], reply, and record the experience for the
//! learner. Between requests it swaps in any policy waiting in the host
//! mailbox, so the device always gets the freshest published policy.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tether_core::{ConfigError, Experience, LinkError};
use tether_encode::StateIdEncoder;
use tether_engine::{ExperienceChannel, PolicyMailbox};
use tether_policy::ExplorationPolicy;

use crate::codec::{self, Opcode};
use crate::transport::Transport;

/// How a served session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The device sent `DISCONNECT`.
    PeerDisconnected,
    /// The stream closed without a `DISCONNECT`.
    ConnectionLost,
}

/// Counters from one [`LinkServer::serve`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    /// Percepts answered.
    pub exchanges: u64,
    /// Policies taken from the mailbox and installed.
    pub policy_swaps: u64,
    /// Experiences accepted by the host experience channel.
    pub experiences_published: u64,
    /// Experiences rejected because the channel was closed.
    pub experiences_dropped: u64,
    /// How the session ended.
    pub end: SessionEnd,
}

/// Serves percept/action exchanges for one device.
pub struct LinkServer<T> {
    transport: T,
    encoder: StateIdEncoder,
    policy: ExplorationPolicy,
    experiences: Option<Arc<ExperienceChannel>>,
    mailbox: Option<Arc<PolicyMailbox>>,
}

impl<T: Transport> LinkServer<T> {
    /// Serve over `transport`. The percept dimension is the encoder's.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidLoopConfig`] if a legal action does not fit
    /// the wire's `i32` action field.
    pub fn new(
        transport: T,
        encoder: StateIdEncoder,
        policy: ExplorationPolicy,
    ) -> Result<Self, ConfigError> {
        if let Some(action) = policy.actions().iter().find(|a| i32::try_from(a.0).is_err()) {
            return Err(ConfigError::InvalidLoopConfig {
                reason: format!("action {action} does not fit the link's i32 action field"),
            });
        }
        Ok(Self {
            transport,
            encoder,
            policy,
            experiences: None,
            mailbox: None,
        })
    }

    /// Record every answered exchange into `channel`.
    pub fn with_experience_channel(mut self, channel: Arc<ExperienceChannel>) -> Self {
        self.experiences = Some(channel);
        self
    }

    /// Swap in policies published to `mailbox` between requests.
    pub fn with_mailbox(mut self, mailbox: Arc<PolicyMailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// The host's exploration policy.
    pub fn policy(&self) -> &ExplorationPolicy {
        &self.policy
    }

    /// Answer requests until the device disconnects, then close the
    /// transport.
    ///
    /// # Errors
    ///
    /// Protocol violations (unknown opcode, policy frames on the request
    /// stream) and non-disconnect I/O failures. The transport is closed
    /// in every case.
    pub fn serve(&mut self) -> Result<SessionReport, LinkError> {
        info!(dim = self.encoder.dimensions(), "link session starting");
        let mut report = SessionReport {
            exchanges: 0,
            policy_swaps: 0,
            experiences_published: 0,
            experiences_dropped: 0,
            end: SessionEnd::ConnectionLost,
        };
        let result = self.serve_inner(&mut report);
        if let Err(e) = self.transport.close() {
            warn!(error = %e, "closing link transport failed");
        }
        result?;
        info!(
            exchanges = report.exchanges,
            swaps = report.policy_swaps,
            end = ?report.end,
            "link session finished"
        );
        Ok(report)
    }

    fn serve_inner(&mut self, report: &mut SessionReport) -> Result<(), LinkError> {
        loop {
            let opcode = match codec::read_opcode(&mut self.transport) {
                Ok(op) => op,
                Err(e) if e.is_disconnect() => {
                    report.end = SessionEnd::ConnectionLost;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            match opcode {
                Opcode::SendPerceptReceiveAction => self.answer(report)?,
                Opcode::Disconnect => {
                    report.end = SessionEnd::PeerDisconnected;
                    return Ok(());
                }
                Opcode::PolicyUpdate => {
                    return Err(LinkError::MalformedFrame {
                        detail: "policy update on the request stream".into(),
                    });
                }
            }
        }
    }

    fn answer(&mut self, report: &mut SessionReport) -> Result<(), LinkError> {
        let observation = codec::read_percept_body(&mut self.transport, self.encoder.dimensions())?;

        if let Some(policy) = self.mailbox.as_ref().and_then(|m| m.take_if_available()) {
            self.policy.set_base_policy(Some(policy));
            report.policy_swaps += 1;
            debug!(exchange = report.exchanges, "host policy swapped in");
        }

        // The body length is fixed by the encoder, so encoding cannot fail.
        let state = self
            .encoder
            .encode(&observation)
            .map_err(|e| LinkError::MalformedFrame {
                detail: e.to_string(),
            })?;
        let action = self.policy.choose_action(state);
        self.transport.send(&codec::encode_action(action)?)?;
        report.exchanges += 1;

        if let Some(channel) = &self.experiences {
            match channel.push(Experience::new(observation, action)) {
                Ok(()) => report.experiences_published += 1,
                Err(_closed) => report.experiences_dropped += 1,
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for LinkServer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkServer")
            .field("encoder", &self.encoder)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
