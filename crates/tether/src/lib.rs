//! Tether: offloaded action selection and policy learning for agents with
//! little onboard compute.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tether sub-crates. For most users, adding `tether` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! // A one-dimensional world whose observation never changes.
//! struct Still;
//! impl Environment for Still {
//!     fn observe(&mut self) -> Observation { Observation::new(vec![0.25]) }
//!     fn perform(&mut self, _action: ActionId) {}
//! }
//!
//! // Learns nothing; publishes "always action 1" once it has seen 10 steps.
//! struct Fixed { seen: usize }
//! impl Learner for Fixed {
//!     fn learn(&mut self, batch: &[Experience]) -> Option<Arc<dyn Policy>> {
//!         self.seen += batch.len();
//!         (self.seen >= 10).then(|| Arc::new(|_s: StateId| Some(ActionId(1))) as Arc<dyn Policy>)
//!     }
//! }
//!
//! let dims: Vec<Box<dyn Discretizer>> =
//!     vec![Box::new(EqualWidthDiscretizer::new(0.0, 1.0, 4).unwrap())];
//! let encoder = StateIdEncoder::new(dims).unwrap();
//! let policy = ExplorationPolicy::new(vec![ActionId(0), ActionId(1)], 0.1, 42).unwrap();
//!
//! let channel = Arc::new(ExperienceChannel::new());
//! let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
//! let learner = LearnerLoop::spawn(
//!     Fixed { seen: 0 },
//!     Arc::clone(&channel),
//!     Arc::clone(&mailbox),
//!     LearnerConfig::default(),
//! )
//! .unwrap();
//!
//! let config = ControlConfig { max_cycles: Some(50), ..Default::default() };
//! let mut control = ControlLoop::new(Still, LocalActionSource::new(encoder, policy), config)
//!     .unwrap()
//!     .with_experience_channel(channel)
//!     .with_mailbox(mailbox);
//! let report = control.run();
//! assert_eq!(report.cycles, 50);
//!
//! let (_learner, learned) = learner.shutdown().unwrap();
//! assert_eq!(learned.experiences, 50);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | IDs, observations, experiences, the `Policy` trait, errors |
//! | [`encode`] | `tether-encode` | Discretizers and the state id encoder |
//! | [`policy`] | `tether-policy` | Epsilon-greedy exploration and epsilon schedules |
//! | [`engine`] | `tether-engine` | Control loop, learner loop, channel, and mailbox |
//! | [`link`] | `tether-link` | Wire protocol, transports, client/server, policy feed |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`tether-core`).
pub use tether_core as types;

/// Observation discretization and state encoding (`tether-encode`).
///
/// [`encode::StateIdEncoder`] combines one [`encode::Discretizer`] per
/// observation dimension into a single mixed-radix state id.
pub use tether_encode as encode;

/// Epsilon-greedy action selection (`tether-policy`).
pub use tether_policy as policy;

/// Control and learner loops (`tether-engine`).
///
/// [`engine::ControlLoop`] runs the on-device sense-act cycle;
/// [`engine::LearnerLoop`] runs learning on its own thread.
pub use tether_engine as engine;

/// Device/host link (`tether-link`).
///
/// [`link::LinkClient`] and [`link::LinkServer`] exchange percepts and
/// actions; [`link::PolicySender`] and [`link::PolicyFeed`] carry policy
/// updates on a side channel.
pub use tether_link as link;

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use tether_core::{ActionId, Experience, Observation, Policy, StateId, TablePolicy};

    // Errors
    pub use tether_core::{ConfigError, EncodeError, LinkError};

    // Encoding
    pub use tether_encode::{Discretizer, EqualWidthDiscretizer, StateIdEncoder};

    // Exploration
    pub use tether_policy::{EpsilonSchedule, ExplorationPolicy};

    // Engine
    pub use tether_engine::{
        ActionSource, ControlConfig, ControlLoop, ControlReport, Environment, ExperienceChannel,
        Learner, LearnerConfig, LearnerLoop, LocalActionSource, PolicyMailbox, StopHandle,
        Termination,
    };

    // Link
    pub use tether_link::{LinkClient, LinkServer, RetryPolicy, StreamTransport, Transport};
}
