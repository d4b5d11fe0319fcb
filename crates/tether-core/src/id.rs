//! Strongly-typed identifiers for discrete states and actions.

use std::fmt;

/// Identifies one cell of the discretized observation space.
///
/// Produced by a state encoder as a mixed-radix number over per-dimension
/// bins. Always satisfies `0 <= id < number_of_values` for the encoder
/// that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u64);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StateId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies one discrete choice from a fixed action repertoire.
///
/// Opaque to the core: the mapping from `ActionId` to an actuator
/// command belongs to the environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ActionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
