//! Device side of the link.

use std::fmt;

use tracing::{debug, trace};

use tether_core::{ActionId, EncodeError, LinkError, Observation};
use tether_engine::{ActionSource, ControlError};

use crate::codec;
use crate::transport::Transport;

/// Synchronous percept/action exchange with a remote host.
///
/// Plugs into a [`ControlLoop`](tether_engine::ControlLoop) as its
/// [`ActionSource`]: every cycle blocks on one round trip. The host
/// chooses and records; the client never learns or explores itself.
pub struct LinkClient<T> {
    transport: T,
    dim: usize,
    exchanges: u64,
    connected: bool,
}

impl<T: Transport> LinkClient<T> {
    /// Talk over `transport`, sending observations of exactly `dim` values.
    pub fn new(transport: T, dim: usize) -> Self {
        Self {
            transport,
            dim,
            exchanges: 0,
            connected: true,
        }
    }

    /// Observation dimension agreed with the host.
    pub fn dimensions(&self) -> usize {
        self.dim
    }

    /// Completed round trips.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Whether `disconnect()` has not yet been called.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Send `observation` and block for the host's action.
    ///
    /// # Errors
    ///
    /// [`ControlError::Encode`] if the observation has the wrong length
    /// (nothing is sent), [`ControlError::Link`] on transport or protocol
    /// failure.
    pub fn send_percept_receive_action(
        &mut self,
        observation: &Observation,
    ) -> Result<ActionId, ControlError> {
        if observation.len() != self.dim {
            return Err(EncodeError::DimensionMismatch {
                expected: self.dim,
                got: observation.len(),
            }
            .into());
        }
        if !self.connected {
            return Err(LinkError::Disconnected.into());
        }
        self.transport.send(&codec::encode_percept(observation))?;
        let action = codec::read_action(&mut self.transport)?;
        self.exchanges += 1;
        trace!(exchange = self.exchanges, %action, "action received");
        Ok(action)
    }

    /// Tell the host the session is over and release the transport.
    ///
    /// Idempotent. The transport is closed even if sending the disconnect
    /// frame fails; the first error is returned.
    pub fn disconnect(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        let sent = self.transport.send(&codec::encode_disconnect());
        let closed = self.transport.close();
        debug!(exchanges = self.exchanges, "link client disconnected");
        sent.and(closed)
    }

    /// Consume the client, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: Transport> ActionSource for LinkClient<T> {
    fn select(&mut self, observation: &Observation) -> Result<ActionId, ControlError> {
        self.send_percept_receive_action(observation)
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        LinkClient::disconnect(self)
    }
}

impl<T> fmt::Debug for LinkClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkClient")
            .field("dim", &self.dim)
            .field("exchanges", &self.exchanges)
            .field("connected", &self.connected)
            .finish()
    }
}
