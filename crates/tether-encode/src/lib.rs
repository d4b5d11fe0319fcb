//! Observation discretization and state encoding.
//!
//! A [`Discretizer`] maps one continuous scalar to a bounded bin index.
//! A [`StateIdEncoder`] composes several discretizers into a single
//! [`StateId`](tether_core::StateId) via mixed-radix encoding, with the
//! first discretizer as the least-significant digit.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod discretizer;
pub mod encoder;

pub use discretizer::{Discretizer, EqualWidthDiscretizer};
pub use encoder::{Bins, StateIdEncoder};
