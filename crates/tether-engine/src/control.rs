//! The on-device control loop and its shutdown state machine.
//!
//! Each cycle: observe, select an action, perform it, record the
//! experience, and (every `policy_check_interval` cycles) swap in a fresh
//! policy from the mailbox if one is waiting. Nothing on this path waits
//! for the learner.
//!
//! ```text
//! Running --(stop request | cycle limit | fatal error)--> Stopping
//! Stopping --(best-effort disconnect)--> Disconnected
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use tether_core::{ActionId, ConfigError, EncodeError, Experience, LinkError, Observation};

use crate::channel::ExperienceChannel;
use crate::config::{ControlConfig, MismatchPolicy};
use crate::mailbox::PolicyMailbox;
use crate::source::{ActionSource, ControlError};

// ── Environment ──────────────────────────────────────────────────

/// The physical or simulated world the control loop acts in.
///
/// # Contract
///
/// - `observe()` must not block indefinitely.
/// - `perform()` starts an action. If actions take time, report progress
///   through `is_completed()`; the loop polls it and never preempts an
///   action in flight.
pub trait Environment {
    /// The current observation.
    fn observe(&mut self) -> Observation;

    /// Start performing `action`.
    fn perform(&mut self, action: ActionId);

    /// Whether the most recently started action has finished. Defaults to
    /// `true` for environments with instantaneous actions.
    fn is_completed(&mut self) -> bool {
        true
    }
}

// ── LoopState / Termination ──────────────────────────────────────

/// Control loop lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Executing cycles.
    Running,
    /// Leaving the cycle loop and releasing the link.
    Stopping,
    /// Terminal: the link has been released.
    Disconnected,
}

/// Why the control loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// A [`StopHandle`] requested a stop.
    StopRequested,
    /// `max_cycles` cycles completed.
    CycleLimit,
    /// An observation had the wrong shape and the configuration says abort.
    DimensionMismatch(EncodeError),
    /// The link failed mid-cycle.
    LinkFailed(LinkError),
    /// `run()` was called on a loop that had already stopped.
    NotRunning,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopRequested => write!(f, "stop requested"),
            Self::CycleLimit => write!(f, "cycle limit reached"),
            Self::DimensionMismatch(e) => write!(f, "aborted: {e}"),
            Self::LinkFailed(e) => write!(f, "link failed: {e}"),
            Self::NotRunning => write!(f, "loop was not running"),
        }
    }
}

// ── ControlReport ────────────────────────────────────────────────

/// Summary of one [`ControlLoop::run`] call.
#[derive(Debug)]
pub struct ControlReport {
    /// Cycles started, including skipped ones.
    pub cycles: u64,
    /// Cycles skipped because of a dimension mismatch.
    pub skipped_cycles: u64,
    /// Policies taken from the mailbox and installed.
    pub policy_swaps: u64,
    /// Experiences accepted by the experience channel.
    pub experiences_published: u64,
    /// Experiences rejected because the channel was closed.
    pub experiences_dropped: u64,
    /// Why the loop stopped.
    pub termination: Termination,
    /// Whether the final disconnect succeeded.
    pub clean_disconnect: bool,
}

impl ControlReport {
    fn new() -> Self {
        Self {
            cycles: 0,
            skipped_cycles: 0,
            policy_swaps: 0,
            experiences_published: 0,
            experiences_dropped: 0,
            termination: Termination::NotRunning,
            clean_disconnect: false,
        }
    }
}

// ── StopHandle ───────────────────────────────────────────────────

/// Cooperative stop signal for a [`ControlLoop`], checked once per cycle.
///
/// Cloneable and `Send`; hand it to whichever thread decides when to stop.
#[derive(Clone, Debug)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request that the loop stop at the end of its current cycle.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ── ControlLoop ──────────────────────────────────────────────────

/// The latency-sensitive sense-act loop.
///
/// Owns its environment and action source. Optionally publishes
/// experiences into an [`ExperienceChannel`] and polls a
/// [`PolicyMailbox`] for fresh policies.
pub struct ControlLoop<E, S> {
    environment: E,
    source: S,
    config: ControlConfig,
    experiences: Option<Arc<ExperienceChannel>>,
    mailbox: Option<Arc<PolicyMailbox>>,
    stop: Arc<AtomicBool>,
    state: LoopState,
}

impl<E: Environment, S: ActionSource> ControlLoop<E, S> {
    /// Create a loop in the `Running` state.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `config` is invalid.
    pub fn new(environment: E, source: S, config: ControlConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            environment,
            source,
            config,
            experiences: None,
            mailbox: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: LoopState::Running,
        })
    }

    /// Publish each (observation, action) pair into `channel`.
    pub fn with_experience_channel(mut self, channel: Arc<ExperienceChannel>) -> Self {
        self.experiences = Some(channel);
        self
    }

    /// Poll `mailbox` for replacement policies.
    pub fn with_mailbox(mut self, mailbox: Arc<PolicyMailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// A handle that can stop this loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The environment.
    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// The action source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consume the loop, returning the environment and action source.
    pub fn into_parts(self) -> (E, S) {
        (self.environment, self.source)
    }

    /// Run cycles until a stop request, the cycle limit, or a fatal error,
    /// then disconnect. The loop ends in `Disconnected`.
    pub fn run(&mut self) -> ControlReport {
        let mut report = ControlReport::new();
        if self.state != LoopState::Running {
            return report;
        }
        info!(config = ?self.config, "control loop starting");

        while self.state == LoopState::Running {
            let cycle_start = Instant::now();
            report.cycles += 1;

            match self.cycle() {
                Ok(Some(experience)) => self.publish(experience, &mut report),
                Ok(None) => {}
                Err(ControlError::Encode(e)) => match self.config.on_dimension_mismatch {
                    MismatchPolicy::SkipCycle => {
                        warn!(cycle = report.cycles, error = %e, "skipping cycle");
                        report.skipped_cycles += 1;
                    }
                    MismatchPolicy::Abort => {
                        self.begin_stopping(&mut report, Termination::DimensionMismatch(e));
                        break;
                    }
                },
                Err(ControlError::Link(e)) => {
                    warn!(cycle = report.cycles, error = %e, "link failed, stopping");
                    self.begin_stopping(&mut report, Termination::LinkFailed(e));
                    break;
                }
            }

            if report.cycles % self.config.policy_check_interval == 0 {
                self.check_mailbox(&mut report);
            }

            if self.stop.load(Ordering::Acquire) {
                self.begin_stopping(&mut report, Termination::StopRequested);
            } else if matches!(self.config.max_cycles, Some(max) if report.cycles >= max) {
                self.begin_stopping(&mut report, Termination::CycleLimit);
            } else if let Some(period) = self.config.cycle_period {
                if let Some(remaining) = period.checked_sub(cycle_start.elapsed()) {
                    thread::sleep(remaining);
                }
            }
        }

        self.finish(&mut report);
        report
    }

    /// One sense-act step. Returns the experience to publish, if the
    /// loop records experiences.
    fn cycle(&mut self) -> Result<Option<Experience>, ControlError> {
        let observation = self.environment.observe();
        let action = self.source.select(&observation)?;
        self.environment.perform(action);
        while !self.environment.is_completed() {
            thread::sleep(self.config.completion_poll);
        }
        Ok(self
            .experiences
            .as_ref()
            .map(|_| Experience::new(observation, action)))
    }

    fn publish(&self, experience: Experience, report: &mut ControlReport) {
        let Some(channel) = &self.experiences else {
            return;
        };
        match channel.push(experience) {
            Ok(()) => report.experiences_published += 1,
            Err(_closed) => {
                if report.experiences_dropped == 0 {
                    debug!("experience channel closed, dropping experiences");
                }
                report.experiences_dropped += 1;
            }
        }
    }

    fn check_mailbox(&mut self, report: &mut ControlReport) {
        let Some(mailbox) = &self.mailbox else {
            return;
        };
        if !self.source.accepts_policies() {
            return;
        }
        if let Some(policy) = mailbox.take_if_available() {
            if self.source.install_policy(policy) {
                report.policy_swaps += 1;
                debug!(cycle = report.cycles, "policy swapped in");
            }
        }
    }

    fn begin_stopping(&mut self, report: &mut ControlReport, termination: Termination) {
        info!(cycle = report.cycles, reason = %termination, "control loop stopping");
        report.termination = termination;
        self.state = LoopState::Stopping;
    }

    /// Stopping -> Disconnected. Transport errors are logged, never fatal.
    fn finish(&mut self, report: &mut ControlReport) {
        report.clean_disconnect = match self.source.disconnect() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "disconnect failed during shutdown");
                false
            }
        };
        self.state = LoopState::Disconnected;
        info!(
            cycles = report.cycles,
            skipped = report.skipped_cycles,
            swaps = report.policy_swaps,
            "control loop disconnected"
        );
    }
}
