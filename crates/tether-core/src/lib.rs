//! Core types and traits for the Tether offloaded control framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the encoder, the exploration policy, the
//! control/learner loops, and the link: identifiers, observations,
//! experiences, the [`Policy`] trait, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod experience;
pub mod id;
pub mod policy;

pub use error::{ConfigError, EncodeError, LinkError};
pub use experience::{Experience, Observation};
pub use id::{ActionId, StateId};
pub use policy::{Policy, TablePolicy};
