//! Bounded retry with exponential backoff for link setup.
//!
//! Only connection establishment retries. Once a session is running, a
//! transport failure is reported immediately and the control loop shuts
//! down.

use std::thread;
use std::time::Duration;

use tracing::debug;

use tether_core::{ConfigError, LinkError};

/// Retry schedule for establishing a link.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 5.
    pub max_attempts: u32,
    /// Sleep after the first failure. Default: 50ms.
    pub initial_backoff: Duration,
    /// Multiplier applied to the sleep after each further failure. Default: 2.0.
    pub backoff_factor: f64,
    /// Upper bound on any single sleep. Default: 2s.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry {
                reason: "max_attempts must be at least 1".into(),
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidRetry {
                reason: format!(
                    "backoff_factor must be finite and >= 1.0, got {}",
                    self.backoff_factor
                ),
            });
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::InvalidRetry {
                reason: format!(
                    "initial_backoff ({:?}) exceeds max_backoff ({:?})",
                    self.initial_backoff, self.max_backoff
                ),
            });
        }
        Ok(())
    }

    /// Sleep before attempt `attempt + 1`, where `attempt` counts failures
    /// so far (starting at 1).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.initial_backoff.as_nanos() as f64 * self.backoff_factor.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            self.max_backoff
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }

    /// Run `op` until it succeeds or the attempts are spent. `op` receives
    /// the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// [`LinkError::Config`] if the policy is invalid (`op` is never
    /// called), otherwise [`LinkError::RetriesExhausted`] wrapping the
    /// final error.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        self.validate()?;
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(LinkError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let backoff = self.backoff_after(attempt);
                    debug!(attempt, ?backoff, error = %e, "retrying");
                    thread::sleep(backoff);
                    attempt += 1;
                }
            }
        }
    }
}
