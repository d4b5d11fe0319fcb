//! Exploration policy for discrete action selection.
//!
//! [`ExplorationPolicy`] turns a [`StateId`](tether_core::StateId) into an
//! [`ActionId`](tether_core::ActionId) by mixing a replaceable base
//! policy with uniform random exploration. [`EpsilonSchedule`] describes
//! how the exploration rate evolves over control cycles.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod exploration;
pub mod schedule;

pub use exploration::{Choice, ExplorationPolicy, ExploreReason};
pub use schedule::EpsilonSchedule;
