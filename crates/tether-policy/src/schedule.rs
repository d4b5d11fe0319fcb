//! Exploration-rate schedules indexed by control cycle.

use tether_core::ConfigError;

/// How epsilon evolves as the control loop runs.
///
/// `value_at(step)` is always within `[0, 1]` for a schedule that passed
/// [`validate()`](Self::validate).
#[derive(Clone, Debug, PartialEq)]
pub enum EpsilonSchedule {
    /// A fixed rate.
    Constant(f64),
    /// Linear interpolation from `start` to `end` over `steps` cycles,
    /// then held at `end`.
    Linear {
        /// Rate at step 0.
        start: f64,
        /// Rate from `steps` onwards.
        end: f64,
        /// Number of cycles the ramp lasts. Must be at least 1.
        steps: u64,
    },
    /// `end + (start - end) * decay^step`.
    Exponential {
        /// Rate at step 0.
        start: f64,
        /// Asymptotic rate.
        end: f64,
        /// Per-step multiplier in `(0, 1]`.
        decay: f64,
    },
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self::Constant(0.1)
    }
}

impl EpsilonSchedule {
    /// Check that every rate is in `[0, 1]` and the shape parameters are
    /// usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |name: &str, v: f64| -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::InvalidSchedule {
                    reason: format!("{name} must be within [0, 1], got {v}"),
                })
            }
        };
        match *self {
            Self::Constant(e) => in_unit("epsilon", e),
            Self::Linear { start, end, steps } => {
                in_unit("start", start)?;
                in_unit("end", end)?;
                if steps == 0 {
                    return Err(ConfigError::InvalidSchedule {
                        reason: "linear schedule needs at least one step".into(),
                    });
                }
                Ok(())
            }
            Self::Exponential { start, end, decay } => {
                in_unit("start", start)?;
                in_unit("end", end)?;
                if !(decay > 0.0 && decay <= 1.0) {
                    return Err(ConfigError::InvalidSchedule {
                        reason: format!("decay must be within (0, 1], got {decay}"),
                    });
                }
                Ok(())
            }
        }
    }

    /// The exploration rate for control cycle `step`.
    pub fn value_at(&self, step: u64) -> f64 {
        let v = match *self {
            Self::Constant(e) => e,
            Self::Linear { start, end, steps } => {
                if step >= steps {
                    end
                } else {
                    let t = step as f64 / steps as f64;
                    start + (end - start) * t
                }
            }
            Self::Exponential { start, end, decay } => {
                let factor = decay.powf(step as f64);
                end + (start - end) * factor
            }
        };
        v.clamp(0.0, 1.0)
    }
}
