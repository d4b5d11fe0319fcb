//! Byte-stream transports for the link.
//!
//! A [`Transport`] moves raw bytes in order without truncation. The
//! protocol layer above it ([`codec`](crate::codec)) never sees the
//! medium: TCP, a serial device, or an in-process queue all look the same.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crossbeam_channel::{Receiver, Sender};
use tracing::{trace, warn};

use tether_core::LinkError;

use crate::retry::RetryPolicy;

/// An ordered, reliable byte stream.
///
/// # Contract
///
/// - `receive(n)` returns exactly `n` bytes or fails; it never returns a
///   short read.
/// - After `close()`, `send` and `receive` fail with
///   [`LinkError::Disconnected`]. Closing twice is a no-op.
/// - Interrupted system calls are retried internally.
pub trait Transport: Send {
    /// Write all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Read exactly `n` bytes, blocking until they arrive.
    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError>;

    /// Release the underlying resources.
    fn close(&mut self) -> Result<(), LinkError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        (**self).receive(n)
    }

    fn close(&mut self) -> Result<(), LinkError> {
        (**self).close()
    }
}

/// A transport whose blocked `receive` can be cut short from another
/// thread.
pub trait Interruptible: Transport {
    /// A handle that makes this transport's pending and future receives
    /// fail with [`LinkError::Disconnected`].
    fn interrupter(&self) -> Result<Interrupter, LinkError>;
}

/// Ends blocking reads on a transport from another thread. See
/// [`Interruptible`].
pub struct Interrupter {
    target: InterruptTarget,
}

enum InterruptTarget {
    Tcp(TcpStream),
    Memory(Sender<()>),
}

impl Interrupter {
    /// Wake the transport's reader. Safe to call more than once.
    pub fn interrupt(&self) -> Result<(), LinkError> {
        match &self.target {
            InterruptTarget::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(e) => Err(e.into()),
            },
            InterruptTarget::Memory(stop) => {
                // A send error means the transport is already dropped.
                if stop.send(()).is_err() {
                    trace!("interrupt after transport drop");
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            InterruptTarget::Tcp(_) => "tcp",
            InterruptTarget::Memory(_) => "memory",
        };
        f.debug_struct("Interrupter").field("target", &target).finish()
    }
}

// ── StreamTransport ─────────────────────────────────────────────

/// A transport over any `Read + Write` stream (TCP socket, serial port
/// file handle, pipe).
///
/// `close()` flushes and drops the stream, which for a socket closes the
/// connection.
pub struct StreamTransport<S> {
    stream: Option<S>,
}

impl<S: Read + Write + Send> StreamTransport<S> {
    /// Wrap an already-open stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> Result<&mut S, LinkError> {
        self.stream.as_mut().ok_or(LinkError::Disconnected)
    }
}

impl StreamTransport<TcpStream> {
    /// Connect to `addr`, retrying according to `retry`.
    ///
    /// Nagle's algorithm is disabled: frames are small and latency-bound.
    ///
    /// # Errors
    ///
    /// [`LinkError::Config`] if `retry` is invalid, otherwise
    /// [`LinkError::RetriesExhausted`] carrying the last connect error.
    pub fn connect_tcp<A: ToSocketAddrs + fmt::Debug>(
        addr: A,
        retry: &RetryPolicy,
    ) -> Result<Self, LinkError> {
        let stream = retry.run(|attempt| {
            TcpStream::connect(&addr).map_err(|e| {
                warn!(?addr, attempt, error = %e, "link connect failed");
                LinkError::from(e)
            })
        })?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Open a second transport on the same socket, e.g. for a reader
    /// thread.
    pub fn try_clone(&self) -> Result<Self, LinkError> {
        let stream = self.stream.as_ref().ok_or(LinkError::Disconnected)?;
        Ok(Self::new(stream.try_clone()?))
    }
}

impl Interruptible for StreamTransport<TcpStream> {
    /// Shuts the socket down in both directions, which also tells the
    /// peer the connection is gone.
    fn interrupter(&self) -> Result<Interrupter, LinkError> {
        let stream = self.stream.as_ref().ok_or(LinkError::Disconnected)?;
        Ok(Interrupter {
            target: InterruptTarget::Tcp(stream.try_clone()?),
        })
    }
}

impl<S: Read + Write + Send> Transport for StreamTransport<S> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let stream = self.stream()?;
        stream.write_all(bytes)?;
        stream.flush()?;
        trace!(len = bytes.len(), "sent");
        Ok(())
    }

    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        let stream = self.stream()?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(LinkError::Disconnected),
                Ok(k) => filled += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        trace!(len = n, "received");
        Ok(buf)
    }

    fn close(&mut self) -> Result<(), LinkError> {
        match self.stream.take() {
            Some(mut stream) => Ok(stream.flush()?),
            None => Ok(()),
        }
    }
}

impl<S> fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("closed", &self.stream.is_none())
            .finish()
    }
}

// ── MemoryTransport ─────────────────────────────────────────────

/// One end of an in-process transport pair. See [`memory_pair`].
///
/// Each `send` enqueues one chunk; `receive` reassembles chunks into the
/// requested length. Once the peer closes (or is dropped) and its chunks
/// are consumed, `receive` fails with [`LinkError::Disconnected`].
pub struct MemoryTransport {
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    pending: VecDeque<u8>,
    closed: bool,
}

enum Wake {
    Chunk(Vec<u8>),
    PeerGone,
    Interrupted,
}

/// Create two connected in-process transports.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = crossbeam_channel::unbounded();
    let (b_tx, a_rx) = crossbeam_channel::unbounded();
    (MemoryTransport::new(a_tx, a_rx), MemoryTransport::new(b_tx, b_rx))
}

impl MemoryTransport {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();
        Self {
            tx: Some(tx),
            rx,
            stop_tx,
            stop_rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let tx = self.tx.as_ref().ok_or(LinkError::Disconnected)?;
        tx.send(bytes.to_vec()).map_err(|_| LinkError::Disconnected)
    }

    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        if self.closed {
            return Err(LinkError::Disconnected);
        }
        while self.pending.len() < n {
            let wake = if self.stop_rx.try_recv().is_ok() {
                Wake::Interrupted
            } else {
                crossbeam_channel::select! {
                    recv(self.rx) -> chunk => chunk.map_or(Wake::PeerGone, Wake::Chunk),
                    recv(self.stop_rx) -> _ => Wake::Interrupted,
                }
            };
            match wake {
                Wake::Chunk(chunk) => self.pending.extend(chunk),
                Wake::PeerGone => return Err(LinkError::Disconnected),
                Wake::Interrupted => {
                    self.close()?;
                    return Err(LinkError::Disconnected);
                }
            }
        }
        Ok(self.pending.drain(..n).collect())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        self.tx = None;
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}

impl Interruptible for MemoryTransport {
    /// Closes this end when it fires; the peer then sees a disconnect.
    fn interrupter(&self) -> Result<Interrupter, LinkError> {
        Ok(Interrupter {
            target: InterruptTarget::Memory(self.stop_tx.clone()),
        })
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("closed", &self.closed)
            .field("pending", &self.pending.len())
            .finish()
    }
}
