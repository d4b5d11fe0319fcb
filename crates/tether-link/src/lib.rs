//! Device/host link for offloaded action selection.
//!
//! Two message streams run between a device and its host:
//!
//! - the **request stream**: the device's [`LinkClient`] sends each
//!   observation and blocks for an action; the host's [`LinkServer`]
//!   answers and records the experience for the learner.
//! - the **policy side channel**: the host's [`PolicySender`] pushes
//!   policy tables; the device's [`PolicyFeed`] thread publishes them into
//!   a local mailbox. Policy receipt never blocks or reorders the request
//!   stream.
//!
//! Both run over any [`Transport`]. See [`codec`] for the wire format.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod feed;
pub mod retry;
pub mod server;
pub mod transport;

pub use client::LinkClient;
pub use codec::Opcode;
pub use feed::{FeedReport, PolicyFeed, PolicyFeedHandle, PolicySender};
pub use retry::RetryPolicy;
pub use server::{LinkServer, SessionEnd, SessionReport};
pub use transport::{
    memory_pair, Interrupter, Interruptible, MemoryTransport, StreamTransport, Transport,
};
