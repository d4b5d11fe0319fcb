//! Control and learner loops for offloaded policy learning.
//!
//! The on-device [`ControlLoop`] runs a synchronous sense-act cycle and
//! publishes [`Experience`](tether_core::Experience) records into an
//! [`ExperienceChannel`]. An independent [`LearnerLoop`] drains that
//! channel on its own thread and deposits new policy snapshots into a
//! [`PolicyMailbox`], which the control loop polls without blocking.
//!
//! ```text
//! Control Thread                           Learner Thread
//!     |                                         |
//!     | observe() -> select() -> perform()      |
//!     |--push(experience)--> ExperienceChannel --| take_one() / drain_all()
//!     |                                         | learner.learn(batch)
//!     |<--take_if_available()-- PolicyMailbox <--| publish(policy)
//!     | source.install_policy()                 |
//! ```
//!
//! The channel and the mailbox are the only state shared between the
//! two loops.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod control;
pub mod learner;
pub mod mailbox;
pub mod source;

pub use channel::{ChannelClosed, ExperienceChannel};
pub use config::{ControlConfig, DrainMode, LearnerConfig, MismatchPolicy};
pub use control::{ControlLoop, ControlReport, Environment, LoopState, StopHandle, Termination};
pub use learner::{Learner, LearnerHandle, LearnerLoop, LearnerReport};
pub use mailbox::PolicyMailbox;
pub use source::{ActionSource, ControlError, LocalActionSource};
