//! Reusable encoder and policy fixtures.
//!
//! - [`unit_encoder`]: one dimension over `[0, 1]`.
//! - [`grid_encoder`]: several dimensions over `[0, 1]` with given bin counts.
//! - [`fixed_policy`]: a constant-action policy.

use std::sync::Arc;

use tether_core::{ActionId, Policy, StateId};
use tether_encode::{Discretizer, EqualWidthDiscretizer, StateIdEncoder};

/// A one-dimensional encoder over `[0, 1]` with `bins` bins.
///
/// # Panics
///
/// Panics if `bins == 0`.
pub fn unit_encoder(bins: usize) -> StateIdEncoder {
    grid_encoder(&[bins])
}

/// An encoder with one `[0, 1]` dimension per entry of `bins`. The first
/// entry is the least-significant digit of the state id.
///
/// # Panics
///
/// Panics on an empty slice, a zero entry, or an overflowing state space.
pub fn grid_encoder(bins: &[usize]) -> StateIdEncoder {
    let dims: Vec<Box<dyn Discretizer>> = bins
        .iter()
        .map(|&n| {
            Box::new(EqualWidthDiscretizer::new(0.0, 1.0, n).expect("valid fixture range"))
                as Box<dyn Discretizer>
        })
        .collect();
    StateIdEncoder::new(dims).expect("valid fixture encoder")
}

/// A policy that answers `action` for every state.
pub fn fixed_policy(action: u32) -> Arc<dyn Policy> {
    Arc::new(move |_state: StateId| Some(ActionId(action)))
}
