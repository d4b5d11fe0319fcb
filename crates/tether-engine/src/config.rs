//! Loop configuration and validation.
//!
//! [`ControlConfig`] and [`LearnerConfig`] are plain structs with sensible
//! defaults; the loop constructors call `validate()` and refuse to build
//! on an invalid configuration.

use std::time::Duration;

use tether_core::ConfigError;

// ── MismatchPolicy ────────────────────────────────────────────────

/// What the control loop does when an observation has the wrong number
/// of dimensions for the encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Count the cycle as skipped and continue. Default.
    #[default]
    SkipCycle,
    /// Stop the loop (disconnecting cleanly).
    Abort,
}

// ── ControlConfig ─────────────────────────────────────────────────

/// Configuration for [`ControlLoop`](crate::ControlLoop).
#[derive(Clone, Debug)]
pub struct ControlConfig {
    /// Stop after this many cycles. `None` = run until a stop request or
    /// a fatal error.
    pub max_cycles: Option<u64>,
    /// Target cycle period. When set, the loop sleeps out the remainder of
    /// each period; when `None` it runs back to back.
    pub cycle_period: Option<Duration>,
    /// Interval between `is_completed()` polls for asynchronous actions.
    /// Default: 1ms.
    pub completion_poll: Duration,
    /// Check the policy mailbox every this many cycles. Default: 1.
    pub policy_check_interval: u64,
    /// Handling of observation/encoder dimension mismatches.
    pub on_dimension_mismatch: MismatchPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            cycle_period: None,
            completion_poll: Duration::from_millis(1),
            policy_check_interval: 1,
            on_dimension_mismatch: MismatchPolicy::SkipCycle,
        }
    }
}

impl ControlConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy_check_interval == 0 {
            return Err(ConfigError::InvalidLoopConfig {
                reason: "policy_check_interval must be at least 1".into(),
            });
        }
        if self.completion_poll.is_zero() {
            return Err(ConfigError::InvalidLoopConfig {
                reason: "completion_poll must be non-zero".into(),
            });
        }
        if matches!(self.cycle_period, Some(p) if p.is_zero()) {
            return Err(ConfigError::InvalidLoopConfig {
                reason: "cycle_period must be non-zero when set".into(),
            });
        }
        Ok(())
    }
}

// ── LearnerConfig ─────────────────────────────────────────────────

/// How the learner thread consumes the experience channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainMode {
    /// Block in `take_one()` for the first experience, then drain whatever
    /// else is queued into the same batch.
    Blocking,
    /// Wake every `interval` and drain everything queued.
    Polling {
        /// Sleep between drains when the channel is empty.
        interval: Duration,
    },
}

/// Configuration for [`LearnerLoop`](crate::LearnerLoop).
#[derive(Clone, Debug)]
pub struct LearnerConfig {
    /// Channel consumption mode. Default: `Blocking`.
    pub mode: DrainMode,
    /// Largest batch handed to `Learner::learn` at once. Default: 256.
    pub max_batch: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            mode: DrainMode::Blocking,
            max_batch: 256,
        }
    }
}

impl LearnerConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch == 0 {
            return Err(ConfigError::InvalidLoopConfig {
                reason: "max_batch must be at least 1".into(),
            });
        }
        if let DrainMode::Polling { interval } = self.mode {
            if interval.is_zero() {
                return Err(ConfigError::InvalidLoopConfig {
                    reason: "polling interval must be non-zero".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ControlConfig::default().validate().is_ok());
        assert!(LearnerConfig::default().validate().is_ok());
    }

    #[test]
    fn control_rejects_zero_intervals() {
        let cfg = ControlConfig {
            policy_check_interval: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ControlConfig {
            completion_poll: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ControlConfig {
            cycle_period: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn learner_rejects_zero_batch_and_interval() {
        let cfg = LearnerConfig {
            max_batch: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LearnerConfig {
            mode: DrainMode::Polling {
                interval: Duration::ZERO,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
