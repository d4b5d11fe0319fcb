//! Benchmark profiles and utilities for the Tether framework.
//!
//! Provides deterministic fixtures shared by the benchmarks and the
//! wiring example:
//!
//! - [`reference_encoder`]: 6 dimensions × 10 bins (one million states)
//! - [`reference_observations`]: seeded observations inside the encoder's range
//! - [`reference_policy`]: epsilon-greedy over 8 actions with a full table

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tether_core::{ActionId, Observation, StateId, TablePolicy};
use tether_encode::{Discretizer, EqualWidthDiscretizer, StateIdEncoder};
use tether_policy::ExplorationPolicy;

/// Observation dimensions in the reference profile.
pub const REFERENCE_DIMS: usize = 6;
/// Bins per dimension in the reference profile.
pub const REFERENCE_BINS: usize = 10;
/// Legal actions in the reference profile.
pub const REFERENCE_ACTIONS: u32 = 8;

/// Build the reference encoder: each dimension spans `[-1, 1]`.
pub fn reference_encoder() -> StateIdEncoder {
    let dims: Vec<Box<dyn Discretizer>> = (0..REFERENCE_DIMS)
        .map(|_| {
            Box::new(EqualWidthDiscretizer::new(-1.0, 1.0, REFERENCE_BINS).unwrap())
                as Box<dyn Discretizer>
        })
        .collect();
    StateIdEncoder::new(dims).unwrap()
}

/// `count` observations drawn uniformly from the reference range.
pub fn reference_observations(count: usize, seed: u64) -> Vec<Observation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let values = (0..REFERENCE_DIMS)
                .map(|_| rng.random_range(-1.0..=1.0))
                .collect();
            Observation::new(values)
        })
        .collect()
}

/// A table defining an action for every `stride`-th state.
pub fn reference_table(states: u64, stride: u64) -> TablePolicy {
    (0..states)
        .step_by(stride.max(1) as usize)
        .map(|s| (StateId(s), ActionId((s % u64::from(REFERENCE_ACTIONS)) as u32)))
        .collect()
}

/// Epsilon-greedy policy over the reference actions, backed by a sparse
/// table covering one state in ten.
pub fn reference_policy(epsilon: f64, seed: u64) -> ExplorationPolicy {
    let actions = (0..REFERENCE_ACTIONS).map(ActionId).collect();
    let encoder = reference_encoder();
    let table = reference_table(encoder.number_of_values(), 10);
    ExplorationPolicy::new(actions, epsilon, seed)
        .unwrap()
        .with_base_policy(Arc::new(table))
}
