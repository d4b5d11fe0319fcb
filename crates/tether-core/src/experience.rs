//! Observations and the (observation, action) experience records built
//! from them.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::id::ActionId;

/// The continuous-valued perception vector at one control cycle.
///
/// Immutable once constructed. The backing storage is shared, so cloning
/// an observation into an [`Experience`] does not copy the values.
#[derive(Clone, PartialEq)]
pub struct Observation {
    values: Arc<[f64]>,
}

impl Observation {
    /// Create an observation from its component values.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// The observation values in dimension order.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the observation has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observation").field(&&*self.values).finish()
    }
}

impl From<Vec<f64>> for Observation {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<&[f64]> for Observation {
    fn from(values: &[f64]) -> Self {
        Self {
            values: values.into(),
        }
    }
}

impl Index<usize> for Observation {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

/// One recorded (observation, action) pair, captured at the moment the
/// action was taken.
///
/// Both halves are required by construction; the learner receives
/// experiences in the order the control loop produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct Experience {
    observation: Observation,
    action: ActionId,
}

impl Experience {
    /// Pair an observation with the action chosen for it.
    pub fn new(observation: Observation, action: ActionId) -> Self {
        Self {
            observation,
            action,
        }
    }

    /// The observation the action was chosen for.
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    /// The action that was performed.
    pub fn action(&self) -> ActionId {
        self.action
    }

    /// Split into the owned observation and action.
    pub fn into_parts(self) -> (Observation, ActionId) {
        (self.observation, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_preserves_order_and_length() {
        let obs = Observation::new(vec![0.5, -1.0, 3.25]);
        assert_eq!(obs.len(), 3);
        assert!(!obs.is_empty());
        assert_eq!(obs.as_slice(), &[0.5, -1.0, 3.25]);
        assert_eq!(obs[2], 3.25);
    }

    #[test]
    fn cloned_observation_shares_storage() {
        let obs = Observation::new(vec![1.0, 2.0]);
        let copy = obs.clone();
        assert!(std::ptr::eq(obs.as_slice(), copy.as_slice()));
    }

    #[test]
    fn experience_round_trips_parts() {
        let obs = Observation::from(&[1.0, 2.0][..]);
        let exp = Experience::new(obs.clone(), ActionId(4));
        assert_eq!(exp.observation(), &obs);
        assert_eq!(exp.action(), ActionId(4));
        let (o, a) = exp.into_parts();
        assert_eq!(o, obs);
        assert_eq!(a, ActionId(4));
    }
}
