//! Where the control loop gets its actions from.
//!
//! [`LocalActionSource`] encodes and chooses on-device. A remote source
//! (the link client) performs a synchronous round trip to the host
//! instead; both sit behind the [`ActionSource`] trait so the control
//! loop does not care which one it drives.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use tether_core::{ActionId, ConfigError, EncodeError, LinkError, Observation, Policy, StateId};
use tether_encode::StateIdEncoder;
use tether_policy::{EpsilonSchedule, ExplorationPolicy};

// ── ControlError ─────────────────────────────────────────────────

/// Errors from one control cycle.
#[derive(Debug)]
pub enum ControlError {
    /// The observation did not fit the encoder.
    Encode(EncodeError),
    /// The link to the host failed.
    Link(LinkError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(e) => Some(e),
            Self::Link(e) => Some(e),
        }
    }
}

impl From<EncodeError> for ControlError {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

impl From<LinkError> for ControlError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ── ActionSource ─────────────────────────────────────────────────

/// Produces the action for an observation.
///
/// # Contract
///
/// - `select()` is called once per control cycle, on the control thread.
/// - `install_policy()` replaces the active policy wholesale. Sources
///   that do not choose locally leave `accepts_policies()` false and are
///   never offered one, so mailbox policies stay available to others.
/// - `disconnect()` is called exactly once when the loop stops. Errors
///   are logged by the loop and never prevent shutdown.
pub trait ActionSource {
    /// Choose the action for `observation`.
    fn select(&mut self, observation: &Observation) -> Result<ActionId, ControlError>;

    /// Whether this source chooses with an installable policy.
    fn accepts_policies(&self) -> bool {
        false
    }

    /// Swap in a new policy snapshot. Returns whether it was applied.
    fn install_policy(&mut self, policy: Arc<dyn Policy>) -> bool {
        let _ = policy;
        false
    }

    /// Release any transport resources.
    fn disconnect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

// ── LocalActionSource ────────────────────────────────────────────

/// On-device action selection: encode the observation, then ask the
/// exploration policy.
#[derive(Debug)]
pub struct LocalActionSource {
    encoder: StateIdEncoder,
    policy: ExplorationPolicy,
    schedule: Option<EpsilonSchedule>,
    steps: u64,
    last_state: Option<StateId>,
}

impl LocalActionSource {
    /// Pair an encoder with an exploration policy. The policy's epsilon is
    /// used as is until a schedule is attached.
    pub fn new(encoder: StateIdEncoder, policy: ExplorationPolicy) -> Self {
        Self {
            encoder,
            policy,
            schedule: None,
            steps: 0,
            last_state: None,
        }
    }

    /// Drive epsilon from `schedule`, indexed by the number of selections
    /// made so far.
    pub fn with_schedule(mut self, schedule: EpsilonSchedule) -> Result<Self, ConfigError> {
        schedule.validate()?;
        self.policy.set_epsilon(schedule.value_at(self.steps))?;
        self.schedule = Some(schedule);
        Ok(self)
    }

    /// The state encoder.
    pub fn encoder(&self) -> &StateIdEncoder {
        &self.encoder
    }

    /// The exploration policy.
    pub fn policy(&self) -> &ExplorationPolicy {
        &self.policy
    }

    /// Mutable access to the exploration policy (epsilon, reseeding).
    pub fn policy_mut(&mut self) -> &mut ExplorationPolicy {
        &mut self.policy
    }

    /// Number of successful selections.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The state id of the most recent successful selection.
    pub fn last_state(&self) -> Option<StateId> {
        self.last_state
    }
}

impl ActionSource for LocalActionSource {
    fn select(&mut self, observation: &Observation) -> Result<ActionId, ControlError> {
        let state = self.encoder.encode(observation)?;
        if let Some(schedule) = &self.schedule {
            let applied = self.policy.set_epsilon(schedule.value_at(self.steps));
            debug_assert!(applied.is_ok(), "validated schedule left [0, 1]: {applied:?}");
        }
        let action = self.policy.choose_action(state);
        self.steps += 1;
        self.last_state = Some(state);
        Ok(action)
    }

    fn accepts_policies(&self) -> bool {
        true
    }

    fn install_policy(&mut self, policy: Arc<dyn Policy>) -> bool {
        debug!(step = self.steps, "installing new base policy");
        self.policy.set_base_policy(Some(policy));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_encode::{Discretizer, EqualWidthDiscretizer};

    fn source(epsilon: f64) -> LocalActionSource {
        let dims: Vec<Box<dyn Discretizer>> = vec![
            Box::new(EqualWidthDiscretizer::new(0.0, 1.0, 2).unwrap()),
            Box::new(EqualWidthDiscretizer::new(0.0, 1.0, 2).unwrap()),
        ];
        let encoder = StateIdEncoder::new(dims).unwrap();
        let policy = ExplorationPolicy::new(vec![ActionId(0), ActionId(1)], epsilon, 9).unwrap();
        LocalActionSource::new(encoder, policy)
    }

    #[test]
    fn select_encodes_then_chooses() {
        let mut src = source(0.0);
        src.install_policy(Arc::new(|s: StateId| Some(ActionId((s.0 % 2) as u32))));
        let action = src.select(&Observation::new(vec![0.9, 0.1])).unwrap();
        assert_eq!(src.last_state(), Some(StateId(1)));
        assert_eq!(action, ActionId(1));
        assert_eq!(src.steps(), 1);
    }

    #[test]
    fn select_reports_dimension_mismatch() {
        let mut src = source(0.0);
        let err = src.select(&Observation::new(vec![0.5])).unwrap_err();
        assert!(matches!(
            err,
            ControlError::Encode(EncodeError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
        assert_eq!(src.steps(), 0);
    }

    #[test]
    fn schedule_drives_epsilon() {
        let mut src = source(0.5)
            .with_schedule(EpsilonSchedule::Linear {
                start: 1.0,
                end: 0.0,
                steps: 4,
            })
            .unwrap();
        assert_eq!(src.policy().epsilon(), 1.0);
        let obs = Observation::new(vec![0.2, 0.2]);
        for _ in 0..5 {
            src.select(&obs).unwrap();
        }
        assert_eq!(src.policy().epsilon(), 0.0);
    }

    #[test]
    fn schedule_tracks_every_step() {
        let schedule = EpsilonSchedule::Exponential {
            start: 1.0,
            end: 0.05,
            decay: 0.5,
        };
        let mut src = source(0.5).with_schedule(schedule.clone()).unwrap();
        let obs = Observation::new(vec![0.7, 0.3]);
        for step in 0..20 {
            src.select(&obs).unwrap();
            assert_eq!(src.policy().epsilon(), schedule.value_at(step));
        }
    }

    #[test]
    fn local_source_accepts_policies() {
        assert!(source(0.0).accepts_policies());
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let result = source(0.5).with_schedule(EpsilonSchedule::Constant(3.0));
        assert!(matches!(result, Err(ConfigError::InvalidSchedule { .. })));
    }
}
